//! duplocloud_aws_tag

use crate::resource::engine::ResourceKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AwsTag {
    pub tenant_id: String,
    pub arn: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuploAwsTag {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value", default)]
    pub value: String,
}

pub struct AwsTagKind;

impl ResourceKind for AwsTagKind {
    type Local = AwsTag;
    type Remote = DuploAwsTag;

    const TYPE_NAME: &'static str = "duplocloud_aws_tag";

    fn identity(local: &AwsTag) -> Vec<String> {
        vec![local.tenant_id.clone(), local.arn.clone(), local.key.clone()]
    }

    fn expand(local: &AwsTag) -> DuploAwsTag {
        DuploAwsTag {
            key: local.key.clone(),
            value: local.value.clone(),
        }
    }

    fn flatten(remote: &DuploAwsTag, prior: &AwsTag, id: &[String]) -> AwsTag {
        let segment = |i: usize, fallback: &str| id.get(i).cloned().unwrap_or_else(|| fallback.to_string());
        AwsTag {
            tenant_id: segment(0, &prior.tenant_id),
            arn: segment(1, &prior.arn),
            key: segment(2, &remote.key),
            value: remote.value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_takes_identity_from_id() {
        let remote = DuploAwsTag {
            key: "env".to_string(),
            value: "prod".to_string(),
        };
        let id = vec![
            "t1".to_string(),
            "arn:aws:s3:::bucket".to_string(),
            "env".to_string(),
        ];
        let local = AwsTagKind::flatten(&remote, &AwsTag::default(), &id);
        assert_eq!(
            local,
            AwsTag {
                tenant_id: "t1".to_string(),
                arn: "arn:aws:s3:::bucket".to_string(),
                key: "env".to_string(),
                value: "prod".to_string(),
            }
        );
    }

    #[test]
    fn test_expand_sends_key_and_value() {
        let local = AwsTag {
            tenant_id: "t1".to_string(),
            arn: "arn".to_string(),
            key: "k".to_string(),
            value: "v".to_string(),
        };
        assert_eq!(
            serde_json::to_value(AwsTagKind::expand(&local)).unwrap(),
            serde_json::json!({"Key": "k", "Value": "v"})
        );
    }
}
