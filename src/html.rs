//! Server-rendered HTML for the dynamic pages (confirmations, listings, errors).
//!
//! Static pages come from `PUBLIC_DIR`; everything here is built per request and
//! every piece of user-controlled text goes through `html_escape`.

use axum::{http::StatusCode, response::Html};
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::constants::MSG_NO_UPLOADS;
use crate::models::UploadRecord;

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<link rel=\"stylesheet\" href=\"/style.css\">\n</head>\n\
         <body>\n{body}\n</body>\n</html>\n",
        title = encode_text(title),
        body = body,
    ))
}

pub fn error_page(status: StatusCode, message: &str) -> Html<String> {
    let title = status.canonical_reason().unwrap_or("Error");
    layout(
        title,
        &format!(
            "<h1>{}</h1>\n<p class=\"error\">{}</p>\n<p><a href=\"/\">Back home</a></p>",
            encode_text(title),
            encode_text(message)
        ),
    )
}

/// Failure page with a link back to the form that failed
pub fn retry_page(action: &str, message: &str, retry_href: &str) -> Html<String> {
    layout(
        &format!("{} failed", action),
        &format!(
            "<h1>{} failed</h1>\n<p class=\"error\">{}</p>\n<p><a href=\"{}\">Try again</a></p>",
            encode_text(action),
            encode_text(message),
            encode_double_quoted_attribute(retry_href)
        ),
    )
}

pub fn upload_confirmation(record: &UploadRecord) -> Html<String> {
    layout(
        "Upload complete",
        &format!(
            "<h1>Upload complete</h1>\n<p><strong>{name}</strong> was uploaded.</p>\n\
             <p><a href=\"{href}\">{href_text}</a></p>\n\
             <p><a href=\"/upload\">Upload another</a> | <a href=\"/downloads\">All files</a></p>",
            name = encode_text(&record.original_name),
            href = encode_double_quoted_attribute(&record.storage_ref),
            href_text = encode_text(&record.storage_ref),
        ),
    )
}

/// Listing of every upload, in index order
pub fn downloads_page(username: &str, records: &[UploadRecord]) -> Html<String> {
    let list = if records.is_empty() {
        format!("<p>{}</p>", MSG_NO_UPLOADS)
    } else {
        let items: String = records
            .iter()
            .map(|r| {
                format!(
                    "<li><a href=\"{}\">{}</a></li>\n",
                    encode_double_quoted_attribute(&r.storage_ref),
                    encode_text(&r.original_name)
                )
            })
            .collect();
        format!("<ul class=\"downloads\">\n{}</ul>", items)
    };

    layout(
        "Downloads",
        &format!(
            "<h1>Uploaded files</h1>\n<p>Signed in as {}. <a href=\"/logout\">Log out</a></p>\n{}\n\
             <p><a href=\"/upload\">Upload a file</a></p>",
            encode_text(username),
            list
        ),
    )
}
