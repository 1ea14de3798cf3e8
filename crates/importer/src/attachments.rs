//! Post-import rewrite of message attachment hosts.

use temba_migrate_storage::StorageError;
use temba_migrate_storage::traits::AttachmentStore;
use url::Url;

/// Messages loaded per round trip.
const BATCH_SIZE: usize = 500;

/// Split an attachment into its `content_type:` prefix (possibly empty) and URL.
fn split_attachment(attachment: &str) -> (&str, &str) {
    if Url::parse(attachment).is_ok_and(|url| url.has_host()) {
        return ("", attachment);
    }
    match attachment.find(':') {
        Some(idx) => attachment.split_at(idx.saturating_add(1)),
        None => ("", attachment),
    }
}

/// Replace the host of `url` when it equals `old_host`, leaving every other
/// byte (scheme, credentials, port, path, query, fragment) untouched.
fn rewrite_url_host(url: &str, old_host: &str, new_host: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !parsed.host_str()?.eq_ignore_ascii_case(old_host) {
        return None;
    }

    let authority_start = url.find("://")?.saturating_add(3);
    let rest = url.get(authority_start..)?;
    let authority = rest.get(..rest.find(['/', '?', '#']).unwrap_or(rest.len()))?;
    let host_offset = authority.rfind('@').map_or(0, |at| at.saturating_add(1));
    let host_part = authority.get(host_offset..)?;
    let host_len = if host_part.starts_with('[') {
        host_part.find(']').map_or(host_part.len(), |end| end.saturating_add(1))
    } else {
        host_part.find(':').unwrap_or(host_part.len())
    };

    let start = authority_start.saturating_add(host_offset);
    let end = start.saturating_add(host_len);
    Some(format!("{}{new_host}{}", url.get(..start)?, url.get(end..)?))
}

/// Rewritten attachment, or `None` when its host does not match.
#[must_use]
pub fn rewrite_attachment(attachment: &str, old_host: &str, new_host: &str) -> Option<String> {
    let (prefix, url) = split_attachment(attachment);
    rewrite_url_host(url, old_host, new_host).map(|url| format!("{prefix}{url}"))
}

/// Rewrite every stored attachment URL whose host is exactly `old_host`.
///
/// Returns the number of messages modified. Idempotent: a second run with the
/// same hosts modifies nothing.
pub async fn rewrite_attachment_hosts(
    store: &dyn AttachmentStore,
    old_host: &str,
    new_host: &str,
) -> Result<u64, StorageError> {
    let (old_host, new_host) = (old_host.trim(), new_host.trim());
    if old_host.is_empty() || old_host.eq_ignore_ascii_case(new_host) {
        return Ok(0);
    }

    let mut after_id = 0;
    let mut modified: u64 = 0;
    loop {
        let batch = store.attachment_batch(after_id, BATCH_SIZE).await?;
        let Some(last) = batch.last() else {
            break;
        };
        after_id = last.msg_id;

        for row in &batch {
            let rewritten: Vec<String> = row
                .attachments
                .iter()
                .map(|a| rewrite_attachment(a, old_host, new_host).unwrap_or_else(|| a.clone()))
                .collect();
            if rewritten != row.attachments {
                store.set_attachments(row.msg_id, &rewritten).await?;
                modified = modified.saturating_add(1);
            }
        }
        tracing::debug!(after_id, modified, "attachment batch processed");

        if batch.len() < BATCH_SIZE {
            break;
        }
    }

    tracing::info!(old_host, new_host, modified, "attachment hosts rewritten");
    Ok(modified)
}
