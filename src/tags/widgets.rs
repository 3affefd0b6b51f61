//! HTML fragments for tags: the multi-select form control and the
//! per-document tag list.

use std::collections::HashMap;

use askama::Template;
use uuid::Uuid;

use crate::{
    acl::{AccessControl, PERMISSION_TAG_VIEW},
    auth::AuthenticatedUser,
    error::AppResult,
    models::Tag,
};

use super::TagLookup;

pub const TAG_CONTAINER_OPEN: &str = r#"<div class="tag-container">"#;
pub const TAG_CONTAINER_CLOSE: &str = "</div>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionAttr {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub name: String,
    pub value: Uuid,
    pub label: String,
    pub selected: bool,
    pub index: usize,
    pub attrs: Vec<OptionAttr>,
}

impl SelectOption {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

#[derive(Template)]
#[template(path = "tags/select.html")]
struct SelectTemplate<'a> {
    name: &'a str,
    options: &'a [SelectOption],
}

#[derive(Template)]
#[template(path = "tags/tag_widget.html")]
struct TagWidgetTemplate<'a> {
    id: Uuid,
    label: &'a str,
    color: &'a str,
}

/// Multi-select over tags where every option carries the tag colour as
/// `data-color`.
#[derive(Debug, Clone)]
pub struct TagFormWidget {
    name: String,
    choices: Vec<(Uuid, String)>,
}

impl TagFormWidget {
    pub fn new(name: impl Into<String>, choices: Vec<(Uuid, String)>) -> Self {
        Self {
            name: name.into(),
            choices,
        }
    }

    pub fn from_tags(name: impl Into<String>, tags: &[Tag]) -> Self {
        Self::new(
            name,
            tags.iter().map(|tag| (tag.id, tag.label.clone())).collect(),
        )
    }

    /// Fails with not-found when `value` does not resolve to a tag.
    pub fn create_option<L: TagLookup + ?Sized>(
        &self,
        lookup: &mut L,
        value: Uuid,
        label: &str,
        selected: bool,
        index: usize,
    ) -> AppResult<SelectOption> {
        let tag = lookup.get_tag(value)?;
        Ok(SelectOption {
            name: self.name.clone(),
            value,
            label: label.to_string(),
            selected,
            index,
            attrs: vec![OptionAttr {
                name: "data-color".to_string(),
                value: tag.color.unwrap_or_default(),
            }],
        })
    }

    pub fn options<L: TagLookup + ?Sized>(
        &self,
        lookup: &mut L,
        selected: &[Uuid],
    ) -> AppResult<Vec<SelectOption>> {
        self.choices
            .iter()
            .enumerate()
            .map(|(index, (value, label))| {
                self.create_option(lookup, *value, label, selected.contains(value), index)
            })
            .collect()
    }

    pub fn render<L: TagLookup + ?Sized>(
        &self,
        lookup: &mut L,
        selected: &[Uuid],
    ) -> AppResult<String> {
        let options = self.options(lookup, selected)?;
        Ok(SelectTemplate {
            name: &self.name,
            options: &options,
        }
        .render()?)
    }
}

/// The tags on a document that `user` may view, wrapped in a tag container.
/// Fragments follow the order the access control hands back.
pub fn widget_document_tags(
    acl: &dyn AccessControl,
    user: &AuthenticatedUser,
    attached: Vec<Tag>,
) -> AppResult<String> {
    let candidate_ids: Vec<Uuid> = attached.iter().map(|tag| tag.id).collect();
    let visible = acl.filter_by_access(&PERMISSION_TAG_VIEW, user, &candidate_ids)?;

    let mut by_id: HashMap<Uuid, Tag> = attached.into_iter().map(|tag| (tag.id, tag)).collect();

    let mut result = String::from(TAG_CONTAINER_OPEN);
    for tag_id in visible {
        if let Some(tag) = by_id.remove(&tag_id) {
            result.push_str(&widget_single_tag(&tag)?);
        }
    }
    result.push_str(TAG_CONTAINER_CLOSE);

    Ok(result)
}

pub fn widget_single_tag(tag: &Tag) -> AppResult<String> {
    Ok(TagWidgetTemplate {
        id: tag.id,
        label: &tag.label,
        color: tag.color.as_deref().unwrap_or_default(),
    }
    .render()?)
}
