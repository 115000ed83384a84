use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Outputs any report body as pretty JSON. Writes to a file if given, otherwise stdout.
pub fn report_json<T: Serialize + ?Sized>(body: &T, output_file: Option<&Path>) -> Result<(), String> {
    let json = serde_json::to_string_pretty(body)
        .map_err(|e| format!("JSON serialization failed: {e}"))?;

    if let Some(path) = output_file {
        fs::write(path, &json)
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
        eprintln!("✓ JSON report written to {}", path.display());
    } else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(json.as_bytes())
            .and_then(|_| stdout.write_all(b"\n"))
            .map_err(|e| format!("Failed to write stdout: {e}"))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_writes_pretty_json_to_file() {
        let path = std::env::temp_dir().join(format!("energy-scanline-report-{}.json", std::process::id()));
        report_json(&json!({ "fileScore": 0.55, "hotspots": [] }), Some(&path)).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n  \"fileScore\": 0.55"), "Output should be pretty-printed: {written}");
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["hotspots"], json!([]));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unwritable_path_reports_error() {
        let path = Path::new("/nonexistent-dir/energy/report.json");
        let err = report_json(&json!({}), Some(path)).unwrap_err();
        assert!(err.contains("report.json"), "{err}");
    }
}
