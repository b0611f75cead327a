//! REST API endpoints for the tool operations.

pub mod handlers;
pub mod routes;
pub mod types;

pub use routes::routes;
pub use types::{
    DownloadRequest, EditFileRequest, OutputResponse, RunCodeRequest, RunEphemeralRequest,
    RunFileRequest, UploadRequest,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_default_to_none() -> anyhow::Result<()> {
        let req: UploadRequest = serde_json::from_str(r#"{"local_path": "data.csv"}"#)?;
        assert_eq!(req.local_path, "data.csv");
        assert!(req.container_path.is_none());
        assert!(req.session_id.is_none());

        let req: RunCodeRequest =
            serde_json::from_str(r#"{"code": "print(1)", "session_id": null}"#)?;
        assert!(req.session_id.is_none());
        Ok(())
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        assert!(serde_json::from_str::<EditFileRequest>(r#"{"container_path": "a.py"}"#).is_err());
    }
}
