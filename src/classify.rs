//! Attachment classifiers
//!
//! Each classifier filters a normalized attachment list down to the kinds it
//! understands and maps them, in order, onto Messenger template elements.

use crate::platform::{Button, ButtonType, GenericElement, ListElement, QuickReply, QuickReplyContent};
use crate::types::{Attachment, AttachmentItem, CONTENT_TYPE_LOCATION};

/// Maximum buttons on a generic template element
pub const MAX_RICH_BUTTONS: usize = 3;

/// Maximum elements in a list template
pub const MAX_LIST_ELEMENTS: usize = 4;

/// Separator between a location's address and the message text
const LOCATION_SEPARATOR: &str = "\n📌\n";

/// Title of the button opening a location
const LOCATION_BUTTON_TITLE: &str = "open";

fn is_image_type(content_type: Option<&str>) -> bool {
    matches!(content_type, Some("image/jpeg" | "image/png" | "image/gif"))
}

/// Location cards
///
/// Keeps `application/x.location` items that carry details. The button links
/// to `details.url`, or to the item's own `url` when details have none.
pub fn location(attachments: &[Attachment], text: Option<&str>) -> Vec<GenericElement> {
    attachments
        .iter()
        .filter_map(|attachment| match attachment {
            Attachment::Item(item) if item.content_type.as_deref() == Some(CONTENT_TYPE_LOCATION) => {
                item.details.as_ref().map(|details| (item, details))
            }
            _ => None,
        })
        .map(|(item, details)| GenericElement {
            title: item.title.clone(),
            subtitle: Some(format!(
                "{}{}{}",
                details.address.as_deref().unwrap_or_default(),
                LOCATION_SEPARATOR,
                text.unwrap_or_default()
            )),
            image_url: item.thumbnail.clone(),
            buttons: Some(vec![Button::web_url(
                Some(LOCATION_BUTTON_TITLE.to_string()),
                details.url.clone().or_else(|| item.url.clone()),
            )]),
        })
        .collect()
}

/// Image cards, titled with the message text
pub fn image(attachments: &[Attachment], text: Option<&str>) -> Vec<GenericElement> {
    attachments
        .iter()
        .filter_map(|attachment| match attachment {
            Attachment::Label(url) => Some(Some(url.clone())),
            Attachment::Item(item) if is_image_type(item.content_type.as_deref()) => {
                Some(item.url.clone())
            }
            Attachment::Item(_) => None,
        })
        .map(|image_url| GenericElement {
            title: text.map(str::to_string),
            image_url,
            ..GenericElement::default()
        })
        .collect()
}

/// Quick replies
///
/// Title falls back to the value; payload is always the value.
pub fn button(attachments: &[Attachment]) -> Vec<QuickReply> {
    attachments
        .iter()
        .filter(|attachment| attachment.is_button())
        .map(|attachment| match attachment {
            Attachment::Label(label) => QuickReply {
                content_type: QuickReplyContent::Text,
                title: Some(label.clone()),
                payload: Some(label.clone()),
            },
            Attachment::Item(item) => QuickReply {
                content_type: QuickReplyContent::Text,
                title: item.title.clone().or_else(|| item.value.clone()),
                payload: item.value.clone(),
            },
        })
        .collect()
}

/// Buttons for an actions card
///
/// Only the first three attachments are considered.
pub fn rich_button(attachments: &[Attachment]) -> Vec<Button> {
    attachments
        .iter()
        .take(MAX_RICH_BUTTONS)
        .filter(|attachment| attachment.is_button())
        .map(|attachment| match attachment {
            Attachment::Label(label) => Button::postback(Some(label.clone()), Some(label.clone())),
            Attachment::Item(item) => Button {
                kind: ButtonType::from_hint(
                    item.details.as_ref().and_then(|details| details.kind.as_deref()),
                ),
                title: item.title.clone(),
                url: item.url.clone(),
                payload: item.value.clone(),
            },
        })
        .collect()
}

/// List template elements
///
/// Only the first four attachments are considered, and of those only
/// `application/x.button` items; bare labels are skipped.
pub fn list(attachments: &[Attachment]) -> Vec<ListElement> {
    attachments
        .iter()
        .take(MAX_LIST_ELEMENTS)
        .filter_map(|attachment| match attachment {
            Attachment::Item(item) if attachment.is_button() => Some(list_element(item)),
            _ => None,
        })
        .collect()
}

fn list_element(item: &AttachmentItem) -> ListElement {
    let details = item.details.as_ref();

    let buttons = match details.and_then(|d| d.actions.as_ref()).and_then(|a| a.first()) {
        Some(action) => Some(vec![Button {
            kind: if action.url.is_some() {
                ButtonType::WebUrl
            } else {
                ButtonType::Postback
            },
            title: action.title.clone(),
            url: action.url.clone(),
            payload: action.value.clone(),
        }]),
        None => item
            .value
            .as_ref()
            .map(|value| vec![Button::postback(item.title.clone(), Some(value.clone()))]),
    };

    ListElement {
        title: item.title.clone(),
        subtitle: details.and_then(|d| d.subtitle.clone()),
        image_url: item.thumbnail.clone(),
        default_action: item
            .url
            .as_ref()
            .map(|url| Button::web_url(item.title.clone(), Some(url.clone()))),
        buttons,
    }
}
