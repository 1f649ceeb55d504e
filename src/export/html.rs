//! Write rendered bodies to `.html` files.

use std::path::{Path, PathBuf};

use crate::error::MsgError;
use crate::model::message::Message;

use super::{output_path, sanitize_filename_part};

/// Write `html` for `message` into `output_dir`.
///
/// The filename is taken from the source `.msg` file stem when there is one,
/// otherwise from the sent date and subject.
pub fn export_html(
    message: &Message,
    html: &str,
    source: Option<&Path>,
    output_dir: &Path,
    overwrite: bool,
) -> anyhow::Result<PathBuf> {
    if output_dir.exists() && !output_dir.is_dir() {
        return Err(MsgError::ExportError(format!(
            "'{}' is not a directory",
            output_dir.display()
        ))
        .into());
    }
    std::fs::create_dir_all(output_dir).map_err(|e| MsgError::io(output_dir, e))?;

    let path = output_path(output_dir, &html_filename(message, source), overwrite);
    std::fs::write(&path, html).map_err(|e| MsgError::io(&path, e))?;
    tracing::debug!(path = %path.display(), size = html.len(), "Wrote HTML");
    Ok(path)
}

/// Generate a filename for HTML export.
fn html_filename(message: &Message, source: Option<&Path>) -> String {
    let stem = source
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .map(|s| sanitize_filename_part(s, 120));

    let name = stem.unwrap_or_else(|| {
        let date = message
            .sent_at
            .map(|d| d.format("%Y%m%d_%H%M%S").to_string())
            .unwrap_or_else(|| "undated".to_string());
        let subject = sanitize_filename_part(message.subject.as_deref().unwrap_or(""), 80);
        format!("{date}_{subject}")
    });
    format!("{name}.html")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_filename_from_source() {
        let msg = Message::default();
        assert_eq!(
            html_filename(&msg, Some(Path::new("/in/Quarterly report.msg"))),
            "Quarterly_report.html"
        );
    }

    #[test]
    fn test_filename_from_date_and_subject() {
        let msg = Message {
            subject: Some("Re: lunch?".into()),
            sent_at: chrono::Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).single(),
            ..Message::default()
        };
        assert_eq!(html_filename(&msg, None), "20240305_093000_Re__lunch_.html");
    }

    #[test]
    fn test_export_html_does_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let msg = Message::default();
        let src = Path::new("mail.msg");

        let first = export_html(&msg, "<p>1</p>", Some(src), dir.path(), false).unwrap();
        let second = export_html(&msg, "<p>2</p>", Some(src), dir.path(), false).unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "<p>1</p>");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "<p>2</p>");

        let third = export_html(&msg, "<p>3</p>", Some(src), dir.path(), true).unwrap();
        assert_eq!(third, first);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "<p>3</p>");
    }

    #[test]
    fn test_export_into_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, "x").unwrap();
        let err = export_html(&Message::default(), "", None, &file, false).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
