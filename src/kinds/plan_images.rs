//! duplocloud_plan_images

use super::common::{key_values, non_empty, DuploKeyStringValue, KeyValue};
use crate::resource::collection::CollectionKind;
use crate::resource::differ::{select, Keyed, Strategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanImages {
    pub plan_id: String,
    #[serde(default)]
    pub image: Vec<PlanImage>,
    #[serde(default)]
    pub delete_unspecified_images: bool,
    #[serde(default)]
    pub images: Vec<PlanImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specified_images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanImage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub tags: Vec<KeyValue>,
}

impl Keyed for PlanImage {
    fn key(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuploPlanImage {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ImageId", default, skip_serializing_if = "String::is_empty")]
    pub image_id: String,
    #[serde(rename = "OS", default, skip_serializing_if = "String::is_empty")]
    pub os: String,
    #[serde(rename = "Tags", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<DuploKeyStringValue>>,
    #[serde(rename = "Username", default, skip_serializing_if = "String::is_empty")]
    pub username: String,
}

pub struct PlanImagesKind;

impl CollectionKind for PlanImagesKind {
    type Local = PlanImages;
    type Item = PlanImage;
    type RemoteItem = DuploPlanImage;

    const TYPE_NAME: &'static str = "duplocloud_plan_images";

    fn identity(local: &PlanImages) -> Vec<String> {
        vec![local.plan_id.clone()]
    }

    fn declared(local: &PlanImages) -> &[PlanImage] {
        &local.image
    }

    fn specified(local: &PlanImages) -> Option<&[String]> {
        local.specified_images.as_deref()
    }

    fn strategy(local: &PlanImages) -> Strategy {
        Strategy::from_delete_unspecified(local.delete_unspecified_images)
    }

    fn expand_item(item: &PlanImage) -> DuploPlanImage {
        DuploPlanImage {
            name: item.name.clone(),
            image_id: item.image_id.clone().unwrap_or_default(),
            os: item.os.clone().unwrap_or_default(),
            tags: if item.tags.is_empty() {
                None
            } else {
                Some(item.tags.iter().map(DuploKeyStringValue::from).collect())
            },
            username: item.username.clone().unwrap_or_default(),
        }
    }

    fn flatten_item(remote: &DuploPlanImage) -> PlanImage {
        PlanImage {
            name: remote.name.clone(),
            image_id: non_empty(&remote.image_id),
            os: non_empty(&remote.os),
            username: non_empty(&remote.username),
            tags: key_values(remote.tags.as_deref()),
        }
    }

    fn flatten(
        all: Vec<PlanImage>,
        specified: Vec<String>,
        prior: &PlanImages,
        id: &[String],
    ) -> PlanImages {
        PlanImages {
            plan_id: id.first().cloned().unwrap_or_else(|| prior.plan_id.clone()),
            image: select(&all, &specified),
            delete_unspecified_images: prior.delete_unspecified_images,
            images: all,
            specified_images: Some(specified),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, id: &str) -> PlanImage {
        PlanImage {
            name: name.to_string(),
            image_id: Some(id.to_string()),
            os: Some("linux".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_expand_then_flatten_keeps_declared_item() {
        let item = PlanImage {
            tags: vec![KeyValue::new("arch", "arm64")],
            ..image("ubuntu", "ami-1")
        };
        let remote = PlanImagesKind::expand_item(&item);
        assert_eq!(remote.os, "linux");
        assert_eq!(PlanImagesKind::flatten_item(&remote), item);
    }

    #[test]
    fn test_expand_omits_unset_fields() {
        let item = PlanImage {
            name: "bare".to_string(),
            ..Default::default()
        };
        let body = serde_json::to_value(PlanImagesKind::expand_item(&item)).unwrap();
        assert_eq!(body, serde_json::json!({"Name": "bare"}));
    }

    #[test]
    fn test_flatten_orders_managed_images_by_specified_keys() {
        let all = vec![image("a", "1"), image("b", "2"), image("c", "3")];
        let local = PlanImagesKind::flatten(
            all,
            vec!["c".to_string(), "a".to_string()],
            &PlanImages::default(),
            &["default".to_string()],
        );
        let names: Vec<&str> = local.image.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
        assert_eq!(local.images.len(), 3);
    }
}
