use {
    crate::StashId,
    anyhow::{Result, bail, format_err},
    serde::{Deserialize, Serialize},
    std::fmt,
};

pub trait RequestToResponse {
    type Response;
    const PATH: &'static str;
}
macro_rules! response_type {
    ($request:ty, $response:ty, $path:literal) => {
        impl RequestToResponse for $request {
            type Response = $response;
            const PATH: &'static str = $path;
        }
    };
}

/// Stores a blob and returns the id it can be pasted with.
#[derive(Clone, Serialize, Deserialize)]
pub struct CopyRequest {
    /// Base64 of the whole encrypted blob.
    pub payload: String,
}
response_type!(CopyRequest, CopyResponse, "copy");

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StashId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Returns a previously stored blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteRequest {
    pub id: StashId,
}
response_type!(PasteRequest, PasteResponse, "paste");

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PasteResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl fmt::Debug for CopyRequest {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyRequest")
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl fmt::Debug for PasteResponse {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasteResponse")
            .field("payload_len", &self.payload.as_ref().map(String::len))
            .field("error", &self.error)
            .finish()
    }
}

impl CopyResponse {
    #[inline]
    pub fn into_result(self) -> Result<StashId> {
        if let Some(msg) = self.error {
            bail!("relay error: {msg}");
        }
        self.id
            .ok_or_else(|| format_err!("relay response contains neither id nor error"))
    }
}

impl From<Result<StashId>> for CopyResponse {
    #[inline]
    fn from(result: Result<StashId>) -> Self {
        match result {
            Ok(id) => Self {
                id: Some(id),
                error: None,
            },
            Err(err) => Self {
                id: None,
                error: Some(format!("{err:#}")),
            },
        }
    }
}

impl PasteResponse {
    #[inline]
    pub fn into_result(self) -> Result<String> {
        if let Some(msg) = self.error {
            bail!("relay error: {msg}");
        }
        self.payload
            .ok_or_else(|| format_err!("relay response contains neither payload nor error"))
    }
}

impl From<Result<String>> for PasteResponse {
    #[inline]
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(payload) => Self {
                payload: Some(payload),
                error: None,
            },
            Err(err) => Self {
                payload: None,
                error: Some(format!("{err:#}")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn wire_format() {
        let request = CopyRequest {
            payload: "aGVsbG8=".into(),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "payload": "aGVsbG8=" }),
        );

        let id: StashId = "abc".parse().unwrap();
        let response = CopyResponse::from(Ok(id.clone()));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "id": "abc" })
        );

        let response = PasteResponse::from(Err(anyhow::anyhow!("payload not found")));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "error": "payload not found" }),
        );

        let request = PasteRequest { id };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "id": "abc" })
        );
    }

    #[test]
    fn responses_into_result() {
        let response: CopyResponse = serde_json::from_str(r#"{"id": "x1"}"#).unwrap();
        assert_eq!(response.into_result().unwrap().as_str(), "x1");

        let response: CopyResponse = serde_json::from_str(r#"{"error": "full"}"#).unwrap();
        let err = response.into_result().unwrap_err();
        assert_eq!(err.to_string(), "relay error: full");

        let response: PasteResponse = serde_json::from_str("{}").unwrap();
        response.into_result().unwrap_err();

        let response: PasteResponse = serde_json::from_str(r#"{"payload": "AA=="}"#).unwrap();
        assert_eq!(response.into_result().unwrap(), "AA==");
    }
}
