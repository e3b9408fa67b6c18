//! Request bodies accepted at the HTTP boundary.
//!
//! Validation happens here so malformed input is rejected before it can
//! reach the cache or the registry.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::{Caption, ClipUpdate};

/// Longest caption text accepted.
pub const MAX_CAPTION_CHARS: usize = 500;

/// Most captions a single clip may carry.
pub const MAX_CAPTIONS: usize = 256;

/// `POST /video`
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoRequest {
    /// Video id or watch URL
    #[validate(length(min = 1, max = 2048))]
    pub video_url: String,
    /// Start caching the source in the background
    #[serde(default)]
    pub save: bool,
}

/// `POST /clip`
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateClipRequest {
    #[validate(length(min = 1, max = 2048))]
    pub video_id: String,
    #[validate(custom(function = "validate_seconds"))]
    pub clip_start: f64,
    #[validate(custom(function = "validate_seconds"))]
    pub clip_end: f64,
}

/// `PUT /clip/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, Validate, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClipRequest {
    #[validate(custom(function = "validate_captions"))]
    pub captions: Vec<Caption>,
    #[serde(default)]
    #[validate(custom(function = "validate_seconds"))]
    pub clip_start: Option<f64>,
    #[serde(default)]
    #[validate(custom(function = "validate_seconds"))]
    pub clip_end: Option<f64>,
}

impl From<UpdateClipRequest> for ClipUpdate {
    fn from(req: UpdateClipRequest) -> Self {
        ClipUpdate {
            captions: Some(req.captions),
            clip_start: req.clip_start,
            clip_end: req.clip_end,
        }
    }
}

fn validate_seconds(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::new("seconds")
            .with_message("must be a finite, non-negative number of seconds".into()));
    }
    Ok(())
}

fn validate_captions(captions: &[Caption]) -> Result<(), ValidationError> {
    if captions.len() > MAX_CAPTIONS {
        return Err(ValidationError::new("too_many_captions"));
    }
    for caption in captions {
        validate_seconds(caption.start)?;
        validate_seconds(caption.end)?;
        if caption.text.chars().count() > MAX_CAPTION_CHARS {
            return Err(ValidationError::new("caption_too_long"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_clip_request_wire_format() {
        let req: CreateClipRequest = serde_json::from_str(
            r#"{"videoId":"cpPeXEh5Wkk","clipStart":709.0,"clipEnd":711.4}"#,
        )
        .unwrap();
        assert_eq!(req.video_id, "cpPeXEh5Wkk");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_missing_video_id_is_rejected() {
        let req = CreateClipRequest {
            video_id: String::new(),
            clip_start: 0.0,
            clip_end: 1.0,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_negative_or_nan_times_are_rejected() {
        let req = CreateClipRequest {
            video_id: "abc".to_string(),
            clip_start: -1.0,
            clip_end: 1.0,
        };
        assert!(req.validate().is_err());

        let req = UpdateClipRequest {
            captions: vec![Caption::new(f64::NAN, 1.0, "x")],
            clip_start: None,
            clip_end: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_optional_times_are_checked_when_present() {
        let req: UpdateClipRequest =
            serde_json::from_str(r#"{"captions":[],"clipStart":2.5,"clipEnd":4.0}"#).unwrap();
        assert!(req.validate().is_ok());

        let req = UpdateClipRequest {
            captions: vec![],
            clip_start: Some(-0.5),
            clip_end: None,
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("clip_start"));
    }

    #[test]
    fn test_update_request_defaults() {
        let req: UpdateClipRequest =
            serde_json::from_str(r#"{"captions":[{"start":0.4,"end":1.4,"text":"hi"}]}"#).unwrap();
        assert!(req.validate().is_ok());

        let update = ClipUpdate::from(req);
        assert_eq!(update.captions.as_ref().map(Vec::len), Some(1));
        assert!(update.clip_start.is_none());
    }

    #[test]
    fn test_save_defaults_to_false() {
        let req: CreateVideoRequest = serde_json::from_str(r#"{"videoUrl":"cpPeXEh5Wkk"}"#).unwrap();
        assert!(!req.save);
    }
}
