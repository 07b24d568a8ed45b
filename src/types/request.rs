use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

use crate::error::ValidationError;

/// Business document types the pipeline can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Quote,
    Invoice,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "quote",
            DocumentKind::Invoice => "invoice",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quote" => Ok(DocumentKind::Quote),
            "invoice" => Ok(DocumentKind::Invoice),
            "" => Err(ValidationError::MissingKind),
            _ => Err(ValidationError::UnknownKind(s.to_string())),
        }
    }
}

/// A pre-authorized remote storage destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    url: Url,
}

impl UploadTarget {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let url = parse_http_url(raw).map_err(|reason| ValidationError::InvalidUploadUrl {
            value: raw.to_string(),
            reason,
        })?;
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Origin and path only. Upload URLs carry credentials in the query.
    pub fn redacted(&self) -> String {
        format!(
            "{}://{}{}",
            self.url.scheme(),
            self.url.host_str().unwrap_or_default(),
            self.url.path()
        )
    }
}

/// Raw query parameters as they arrive at the HTTP or CLI boundary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    pub upload_url: Option<String>,
}

/// One accepted render request. Fields are fixed once constructed.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    kind: DocumentKind,
    document_id: String,
    source_url: Option<Url>,
    upload_target: Option<UploadTarget>,
}

impl RenderRequest {
    pub fn new(kind: DocumentKind, document_id: impl Into<String>) -> Result<Self, ValidationError> {
        let document_id = document_id.into();
        if document_id.trim().is_empty() {
            return Err(ValidationError::EmptyDocumentId);
        }
        Ok(Self {
            kind,
            document_id,
            source_url: None,
            upload_target: None,
        })
    }

    pub fn with_source_url(mut self, url: Url) -> Self {
        self.source_url = Some(url);
        self
    }

    pub fn with_upload_target(mut self, target: UploadTarget) -> Self {
        self.upload_target = Some(target);
        self
    }

    /// Validate boundary parameters into a request. Blank optional values are
    /// treated as absent.
    pub fn from_params(document_id: &str, params: &RequestParams) -> Result<Self, ValidationError> {
        let kind: DocumentKind = params
            .kind
            .as_deref()
            .ok_or(ValidationError::MissingKind)?
            .parse()?;
        let mut request = Self::new(kind, document_id.trim())?;

        if let Some(raw) = non_blank(params.url.as_deref()) {
            let url = parse_http_url(raw).map_err(|reason| ValidationError::InvalidSourceUrl {
                value: raw.to_string(),
                reason,
            })?;
            request = request.with_source_url(url);
        }

        if let Some(raw) = non_blank(params.upload_url.as_deref()) {
            request = request.with_upload_target(UploadTarget::parse(raw)?);
        }

        Ok(request)
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn source_url(&self) -> Option<&Url> {
        self.source_url.as_ref()
    }

    pub fn upload_target(&self) -> Option<&UploadTarget> {
        self.upload_target.as_ref()
    }

    /// The explicit override if present, otherwise the page collaborator's
    /// deterministic URL for this document.
    pub fn resolve_source_url(&self, base: &Url, page_path: &str) -> Result<Url, ValidationError> {
        match &self.source_url {
            Some(url) => Ok(url.clone()),
            None => page_url(base, page_path, self.kind, &self.document_id),
        }
    }
}

/// Build the printable page URL by substituting `{type}` and `{id}` into the
/// path template. Each template segment is percent-encoded on its own.
pub fn page_url(
    base: &Url,
    template: &str,
    kind: DocumentKind,
    document_id: &str,
) -> Result<Url, ValidationError> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ValidationError::InvalidSourceUrl {
                value: base.to_string(),
                reason: "base url cannot carry a path".to_string(),
            })?;
        segments.pop_if_empty();
        for raw in template.split('/').filter(|s| !s.is_empty()) {
            let segment = raw
                .replace("{type}", kind.as_str())
                .replace("{id}", document_id);
            segments.push(&segment);
        }
    }
    url.set_query(None);
    Ok(url)
}

fn parse_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme {other:?} (expected http or https)")),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(kind: Option<&str>, url: Option<&str>, upload: Option<&str>) -> RequestParams {
        RequestParams {
            kind: kind.map(str::to_string),
            url: url.map(str::to_string),
            upload_url: upload.map(str::to_string),
        }
    }

    #[test]
    fn parses_kind_case_insensitively() {
        assert_eq!("Quote".parse::<DocumentKind>().unwrap(), DocumentKind::Quote);
        assert_eq!(" invoice ".parse::<DocumentKind>().unwrap(), DocumentKind::Invoice);
    }

    #[test]
    fn rejects_unknown_and_missing_kind() {
        assert_eq!(
            RenderRequest::from_params("Q1", &params(Some("receipt"), None, None)).unwrap_err(),
            ValidationError::UnknownKind("receipt".into())
        );
        assert_eq!(
            RenderRequest::from_params("Q1", &params(None, None, None)).unwrap_err(),
            ValidationError::MissingKind
        );
        assert_eq!(
            RenderRequest::from_params("Q1", &params(Some(""), None, None)).unwrap_err(),
            ValidationError::MissingKind
        );
    }

    #[test]
    fn rejects_blank_document_id() {
        assert_eq!(
            RenderRequest::from_params("  ", &params(Some("quote"), None, None)).unwrap_err(),
            ValidationError::EmptyDocumentId
        );
    }

    #[test]
    fn blank_optional_params_are_absent() {
        let req =
            RenderRequest::from_params("Q1", &params(Some("quote"), Some(""), Some("  "))).unwrap();
        assert!(req.source_url().is_none());
        assert!(req.upload_target().is_none());
    }

    #[test]
    fn rejects_non_http_urls() {
        let err = RenderRequest::from_params("Q1", &params(Some("quote"), Some("file:///etc/passwd"), None))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidSourceUrl { .. }));

        let err = RenderRequest::from_params("Q1", &params(Some("quote"), None, Some("not a url")))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidUploadUrl { .. }));
    }

    #[test]
    fn default_page_url_uses_template() {
        let base = Url::parse("http://localhost:3000").unwrap();
        let req = RenderRequest::new(DocumentKind::Invoice, "I1").unwrap();
        let url = req.resolve_source_url(&base, "/print/{type}/{id}").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/print/invoice/I1");
    }

    #[test]
    fn page_url_keeps_base_path_and_encodes_id() {
        let base = Url::parse("https://app.example.com/portal/").unwrap();
        let url = page_url(&base, "/{type}s/{id}/print", DocumentKind::Quote, "Q 1/2").unwrap();
        assert_eq!(
            url.as_str(),
            "https://app.example.com/portal/quotes/Q%201%2F2/print"
        );
    }

    #[test]
    fn explicit_source_url_overrides_template() {
        let base = Url::parse("http://localhost:3000").unwrap();
        let req = RenderRequest::from_params(
            "Q1",
            &params(Some("quote"), Some("https://preview.example.com/q/1"), None),
        )
        .unwrap();
        let url = req.resolve_source_url(&base, "/print/{type}/{id}").unwrap();
        assert_eq!(url.as_str(), "https://preview.example.com/q/1");
    }

    #[test]
    fn upload_target_redacts_query() {
        let target =
            UploadTarget::parse("https://storage.example.com/api/upload?token=secret").unwrap();
        assert_eq!(target.redacted(), "https://storage.example.com/api/upload");
        assert!(target.url().query().is_some());
    }
}
