use std::io::Write;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::ReportSink;
use crate::models::ScanReport;
use crate::utils::Result;

/// Writes the report as pretty JSON to any `Write` (stdout in the CLI).
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: Write + Send> ReportSink for WriterSink<W> {
    async fn persist(&self, report: &ScanReport) -> Result<()> {
        let json = report.to_json()?;
        let mut writer = self.writer.lock().await;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_json_document() {
        let sink = WriterSink::new(Vec::new());
        let report = ScanReport::new();

        sink.persist(&report).await.unwrap();

        let written = String::from_utf8(sink.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["timestamp"], report.timestamp.as_str());
        assert!(value["summaryStatistics"].is_object());
    }
}
