use anyhow::Result;
use tracing::{debug, warn};

use crate::config::PageFormsConfig;
use crate::forms::FormResolver;
use crate::title::{NS_CATEGORY, NS_SPECIAL, NamespaceTable, PageTitle};

/// Fallback owner of pages created from red links.
pub const DEFAULT_CREATOR_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCreationJob {
    pub title: PageTitle,
    pub form: String,
    pub user_id: i64,
    pub page_text: String,
}

pub trait PageCreationQueue: Send + Sync {
    fn user_id(&self, user_name: &str) -> Result<Option<i64>>;
    fn push(&self, job: &PageCreationJob) -> Result<()>;
}

/// Link target for a link to `target`, or `None` to keep the default link.
///
/// Only missing, non-special pages are rewritten. When every red link goes to
/// a form, category pages are left alone; otherwise the namespace must have a
/// default form.
pub fn red_link_href(
    target: &PageTitle,
    is_known: bool,
    config: &PageFormsConfig,
    namespaces: &NamespaceTable,
    resolver: &FormResolver<'_>,
) -> Option<String> {
    if is_known || target.namespace == NS_SPECIAL {
        return None;
    }
    if config.link_all_red_links_to_forms() && target.namespace != NS_CATEGORY {
        return Some(form_edit_url(config, namespaces, target));
    }
    resolver
        .default_form_for_namespace(target.namespace)
        .map(|_| form_edit_url(config, namespaces, target))
}

/// `article_path` with `$1` replaced by the prefixed title, plus the
/// form-edit query. Absolute when `wiki.url` is configured.
pub fn form_edit_url(config: &PageFormsConfig, namespaces: &NamespaceTable, target: &PageTitle) -> String {
    let title = target.prefixed_text(namespaces).replace(' ', "_");
    let encoded = encode_title(&title);
    let path = config.article_path().replace("$1", &encoded);
    let separator = if path.contains('?') { '&' } else { '?' };
    let base = config
        .wiki
        .url
        .as_deref()
        .map(|url| url.trim().trim_end_matches('/'))
        .unwrap_or_default();
    format!("{base}{path}{separator}action=formedit&redlink=1")
}

fn encode_title(title: &str) -> String {
    url::form_urlencoded::byte_serialize(title.as_bytes())
        .collect::<String>()
        .replace("%3A", ":")
        .replace("%2F", "/")
}

/// Queue creation of `target` with text generated from `form`. The creator is
/// the configured auto-create user when it exists, else user 1.
pub fn create_page_with_form(
    queue: &dyn PageCreationQueue,
    config: &PageFormsConfig,
    target: &PageTitle,
    form: &str,
    page_text: &str,
) -> Result<PageCreationJob> {
    let user_id = match config.forms.auto_create_user.as_deref() {
        Some(name) => match queue.user_id(name)? {
            Some(id) => id,
            None => {
                warn!(user = name, "auto-create user does not exist, using the default creator");
                DEFAULT_CREATOR_ID
            }
        },
        None => DEFAULT_CREATOR_ID,
    };
    let job = PageCreationJob {
        title: target.clone(),
        form: form.to_string(),
        user_id,
        page_text: page_text.to_string(),
    };
    queue.push(&job)?;
    debug!(title = target.text.as_str(), form, user_id, "queued page creation");
    Ok(job)
}
