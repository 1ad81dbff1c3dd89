use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Utc;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};
use serde::Serialize;

use crate::errors::{Result, StashError};
use crate::storage::models::{Comment, EngagementStats, SentimentDistribution};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportFormat {
    Csv,
    Json,
    Html,
    Xlsx,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Html => "html",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn parse(s: &str) -> Option<ExportFormat> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            "html" | "htm" => Some(ExportFormat::Html),
            "xlsx" | "excel" => Some(ExportFormat::Xlsx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<ExportFormat> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(ExportFormat::parse)
    }
}

/// A row type that can be flattened into a table.
pub trait Tabular: Serialize {
    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl Tabular for Comment {
    fn headers() -> &'static [&'static str] {
        &[
            "comment_id",
            "video_id",
            "username",
            "comment_text",
            "likes",
            "comment_time",
            "replies_count",
            "is_reply",
            "parent_comment_id",
            "sentiment",
            "hashtags",
            "crawled_at",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.comment_id.to_string(),
            self.video_id.clone(),
            self.username.clone(),
            opt(&self.comment_text),
            self.likes.to_string(),
            opt(&self.comment_time),
            self.replies_count.to_string(),
            self.is_reply.to_string(),
            opt(&self.parent_comment_id),
            self.sentiment.map(|s| s.as_str().to_string()).unwrap_or_default(),
            self.hashtags.iter().cloned().collect::<Vec<_>>().join(" "),
            self.crawled_at.to_rfc3339(),
        ]
    }
}

impl Tabular for EngagementStats {
    fn headers() -> &'static [&'static str] {
        &[
            "video_id",
            "author",
            "title",
            "total_comments",
            "unique_commenters",
            "avg_likes_per_comment",
            "main_comments",
            "replies",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.video_id.clone(),
            opt(&self.author),
            opt(&self.title),
            self.total_comments.to_string(),
            self.unique_commenters.to_string(),
            self.avg_likes_per_comment
                .map(|avg| format!("{:.2}", avg))
                .unwrap_or_default(),
            self.main_comments.to_string(),
            self.replies.to_string(),
        ]
    }
}

impl Tabular for SentimentDistribution {
    fn headers() -> &'static [&'static str] {
        &[
            "video_id",
            "total_comments",
            "positive_count",
            "neutral_count",
            "negative_count",
            "unclassified_count",
            "positive_percentage",
            "negative_percentage",
        ]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.video_id.clone(),
            self.total_comments.to_string(),
            self.positive_count.to_string(),
            self.neutral_count.to_string(),
            self.negative_count.to_string(),
            self.unclassified_count.to_string(),
            opt(&self.positive_percentage),
            opt(&self.negative_percentage),
        ]
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn write_csv<T: Tabular, W: Write>(rows: &[T], out: &mut W) -> Result<()> {
    // BOM so spreadsheet tools pick UTF-8.
    out.write_all("\u{feff}".as_bytes())?;
    let header: Vec<String> = T::headers().iter().map(|h| csv_field(h)).collect();
    writeln!(out, "{}", header.join(","))?;
    for row in rows {
        let cells: Vec<String> = row.cells().iter().map(|c| csv_field(c)).collect();
        writeln!(out, "{}", cells.join(","))?;
    }
    Ok(())
}

fn write_html<T: Tabular, W: Write>(rows: &[T], title: &str, out: &mut W) -> Result<()> {
    let title = html_escape(title);
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>", title)?;
    writeln!(
        out,
        "<style>\nbody {{ font-family: Arial, sans-serif; margin: 20px; }}\n\
         table {{ border-collapse: collapse; width: 100%; }}\n\
         th, td {{ text-align: left; padding: 8px; border: 1px solid #ddd; }}\n\
         th {{ background-color: #f2f2f2; }}\n\
         tr:nth-child(even) {{ background-color: #f9f9f9; }}\n</style>\n</head>\n<body>"
    )?;
    writeln!(out, "<h1>{}</h1>", title)?;
    writeln!(
        out,
        "<div class=\"info\">\n<p>Rows: {}</p>\n<p>Exported: {}</p>\n</div>",
        rows.len(),
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "<table>\n<thead>\n<tr>")?;
    for header in T::headers() {
        writeln!(out, "<th>{}</th>", html_escape(header))?;
    }
    writeln!(out, "</tr>\n</thead>\n<tbody>")?;
    for row in rows {
        write!(out, "<tr>")?;
        for cell in row.cells() {
            write!(out, "<td>{}</td>", html_escape(&cell))?;
        }
        writeln!(out, "</tr>")?;
    }
    writeln!(out, "</tbody>\n</table>\n</body>\n</html>")?;
    Ok(())
}

// Excel limits sheet names to 31 characters and forbids []:*?/\ in them.
fn sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|ch| if "[]:*?/\\".contains(ch) { ' ' } else { ch })
        .take(31)
        .collect();
    let trimmed = cleaned.trim().trim_matches('\'');
    if trimmed.is_empty() {
        "Sheet1".to_string()
    } else {
        trimmed.to_string()
    }
}

fn write_xlsx<T: Tabular, W: Write>(rows: &[T], title: &str, out: &mut W) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new()
        .set_bold()
        .set_text_wrap()
        .set_align(FormatAlign::Top)
        .set_background_color(Color::RGB(0xD7E4BC))
        .set_border(FormatBorder::Thin);

    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name(title))?;
    for (col, name) in T::headers().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *name, &header)?;
    }
    for (index, row) in rows.iter().enumerate() {
        for (col, cell) in row.cells().iter().enumerate() {
            sheet.write_string(index as u32 + 1, col as u16, cell)?;
        }
    }
    sheet.autofit();

    out.write_all(&workbook.save_to_buffer()?)?;
    Ok(())
}

pub fn write_rows<T: Tabular, W: Write>(
    rows: &[T],
    format: ExportFormat,
    title: &str,
    out: &mut W,
) -> Result<()> {
    match format {
        ExportFormat::Csv => write_csv(rows, out),
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, rows)?;
            writeln!(out)?;
            Ok(())
        }
        ExportFormat::Html => write_html(rows, title, out),
        ExportFormat::Xlsx => write_xlsx(rows, title, out),
    }
}

/// Writes rows to `path`, creating parent directories as needed.
pub fn export_to_path<T: Tabular>(
    rows: &[T],
    format: ExportFormat,
    title: &str,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)
        .map_err(|e| StashError::Export(format!("cannot create {}: {}", path.display(), e)))?;
    let mut out = BufWriter::new(file);
    write_rows(rows, format, title, &mut out)?;
    out.flush()?;
    Ok(())
}
