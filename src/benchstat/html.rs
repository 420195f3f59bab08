use std::io::{self, Write};

use crate::benchstat::{Change, ComparisonTable};

const STYLE: &str = "<style>.benchstat td, .benchstat th { padding: 0 1em; } \
.benchstat td:nth-child(n+2) { text-align: right; } \
.benchstat .worse { color: #b00; } .benchstat .better { color: #070; } \
.benchstat .unchanged { color: #666; }</style>";

/// Write tables as HTML, one `<table class='benchstat'>` per metric
pub fn write_html(w: &mut dyn Write, tables: &[ComparisonTable], no_range: bool) -> io::Result<()> {
    if tables.is_empty() {
        return Ok(());
    }
    writeln!(w, "{STYLE}")?;

    for table in tables {
        writeln!(w, "<table class='benchstat'>")?;
        writeln!(
            w,
            "<tr><th>name</th><th>old {metric}</th><th>new {metric}</th><th>delta</th><th>note</th></tr>",
            metric = escape(&table.metric)
        )?;

        let mut group = "";
        for row in &table.rows {
            if row.group != group {
                group = &row.group;
                if !group.is_empty() {
                    writeln!(
                        w,
                        "<tr class='group'><th colspan='5'>{}</th></tr>",
                        escape(group)
                    )?;
                }
            }
            let class = match row.change {
                Change::Degrading => "worse",
                Change::Improving => "better",
                Change::Insignificant => "unchanged",
            };
            writeln!(
                w,
                "<tr class='{class}'><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&row.benchmark),
                escape(&row.old_cell(no_range)),
                escape(&row.new_cell(no_range)),
                escape(&row.delta),
                escape(&row.note),
            )?;
        }
        writeln!(w, "</table>")?;
    }
    Ok(())
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&#39;"),
            '"' => out.push_str("&#34;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchstat::{build_tables, parse_str, BenchstatConfig, DeltaTest};

    #[test]
    fn test_html_rows() {
        let old = parse_str("goos: linux\nBenchmarkA<b> 1 100 ns/op\nBenchmarkB 1 100 ns/op\n");
        let new = parse_str("goos: linux\nBenchmarkA<b> 1 200 ns/op\nBenchmarkB 1 50 ns/op\n");
        let config = BenchstatConfig {
            delta_test: DeltaTest::None,
            split_by: vec!["goos".to_string()],
            ..BenchstatConfig::default()
        };
        let tables = build_tables(&old, &new, &config);

        let mut buf = Vec::new();
        write_html(&mut buf, &tables, false).unwrap();
        let html = String::from_utf8(buf).unwrap();

        assert!(html.contains("<table class='benchstat'>"));
        assert!(html.contains("<th>old time/op</th>"));
        assert!(html.contains("<tr class='group'><th colspan='5'>goos:linux</th></tr>"));
        assert!(html.contains("<tr class='worse'><td>A&lt;b&gt;</td>"));
        assert!(html.contains("<tr class='better'><td>B</td>"));
        assert!(html.trim_end().ends_with("</table>"));
    }

    #[test]
    fn test_html_empty() {
        let mut buf = Vec::new();
        write_html(&mut buf, &[], false).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a&b \"c\" 'd'"), "a&amp;b &#34;c&#34; &#39;d&#39;");
    }
}
