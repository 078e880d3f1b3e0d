/// Read side of the legacy export bucket.
pub trait ObjectSource {
    fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, String>;
    fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String>;
}

/// Destination for failure reports.
pub trait ReportStore {
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String>;
}
