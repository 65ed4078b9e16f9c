use crate::models::{LightEmail, RawMessage};

/// Projects a message down to its first `Date` and first `From` header and
/// its snippet. Header names match case-sensitively; absent headers are `None`.
pub fn extract(message: &RawMessage) -> LightEmail {
    let mut date = None;
    let mut from = None;

    for header in &message.payload.headers {
        if date.is_some() && from.is_some() {
            break;
        }
        match header.name.as_str() {
            "Date" if date.is_none() => date = Some(header.value.clone()),
            "From" if from.is_none() => from = Some(header.value.clone()),
            _ => {}
        }
    }

    LightEmail {
        message_id: message.id.clone(),
        date,
        from,
        snippet: html_entity_decode(&message.snippet),
        label_name: None,
    }
}

/// Gmail snippets arrive HTML-escaped.
pub fn html_entity_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
