//! HTML document assembly shared by server rendering and prerendering

use crate::adapter::{Adapter, Component, RenderContext, BODY_MARKER, CONTAINER_ID, HEAD_MARKER};
use anyhow::{bail, Result};
use html_escape::encode_double_quoted_attribute;
use serde_json::Value;
use vellum_router::Params;

/// Id of the script element carrying page data for hydration
pub const DATA_SCRIPT_ID: &str = "__VELLUM_DATA__";

/// Serializes `data` for embedding in a `<script>` element
///
/// Every `<` is escaped so the payload can never close the element.
///
/// # Examples
///
/// ```
/// use vellum::document::script_safe_json;
///
/// let json = script_safe_json(&serde_json::json!({ "html": "</script>" }));
/// assert_eq!(json, r#"{"html":"\u003c/script>"}"#);
/// ```
pub fn script_safe_json(data: &Value) -> String {
    data.to_string().replace('<', "\\u003c")
}

/// Quotes `value` as a JavaScript string literal
///
/// # Examples
///
/// ```
/// use vellum::document::js_string;
///
/// assert_eq!(js_string(r#"/src/"x"\y.ts"#), r#""/src/\"x\"\\y.ts""#);
/// ```
pub fn js_string(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Public URL of a client file under `base`
///
/// # Examples
///
/// ```
/// use vellum::document::asset_url;
///
/// assert_eq!(asset_url("/", "entries/about-1a2b.js"), "/entries/about-1a2b.js");
/// assert_eq!(asset_url("/app/", "/chunk.js"), "/app/chunk.js");
/// assert_eq!(asset_url("/app", "chunk.js"), "/app/chunk.js");
/// ```
pub fn asset_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Fills the adapter's document shell
///
/// The body marker receives the rendered markup inside the hydration
/// container, the page data script and, when present, the client entry.
pub fn assemble_document(
    shell: &str,
    head: &[String],
    body_html: &str,
    data: &Value,
    client_entry_url: Option<&str>,
) -> Result<String> {
    if !shell.contains(HEAD_MARKER) || !shell.contains(BODY_MARKER) {
        bail!(
            "document shell must contain both {} and {}",
            HEAD_MARKER,
            BODY_MARKER
        );
    }

    let mut body = format!(
        "<div id=\"{}\">{}</div>\n<script id=\"{}\" type=\"application/json\">{}</script>",
        CONTAINER_ID,
        body_html,
        DATA_SCRIPT_ID,
        script_safe_json(data)
    );
    if let Some(url) = client_entry_url {
        body.push_str(&format!(
            "\n<script type=\"module\" src=\"{}\"></script>",
            encode_double_quoted_attribute(url)
        ));
    }

    Ok(shell
        .replacen(HEAD_MARKER, &head.join("\n"), 1)
        .replacen(BODY_MARKER, &body, 1))
}

/// A page ready to render
pub struct PageRender<'a> {
    pub component: &'a Component,
    /// Layout components, outermost first
    pub layouts: Vec<Component>,
    pub data: &'a Value,
    pub url: &'a str,
    pub params: Params,
    pub client_entry_url: Option<String>,
    /// Stylesheet URLs linked from the head
    pub stylesheets: Vec<String>,
}

/// Renders a page through `adapter` and assembles the full document
pub fn render_document(adapter: &dyn Adapter, page: PageRender<'_>) -> Result<String> {
    let mut ctx = RenderContext::new(page.url, page.params).with_layouts(page.layouts);
    for href in &page.stylesheets {
        ctx.push_head(format!(
            "<link rel=\"stylesheet\" href=\"{}\">",
            encode_double_quoted_attribute(href)
        ));
    }
    let html = adapter.render_to_html(page.component, page.data, &mut ctx)?;

    assemble_document(
        &adapter.document_shell(),
        ctx.head(),
        &html,
        page.data,
        page.client_entry_url.as_deref(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::DEFAULT_DOCUMENT_SHELL;
    use crate::template::{Template, TemplateAdapter};
    use serde_json::json;

    #[test]
    fn test_assemble_document() {
        let html = assemble_document(
            DEFAULT_DOCUMENT_SHELL,
            &["<title>Hi</title>".to_string()],
            "<h1>Hi</h1>",
            &json!({ "x": 1 }),
            Some("/entries/page.js"),
        )
        .unwrap();

        assert!(html.contains("<title>Hi</title>"));
        assert!(html.contains("<div id=\"vellum-root\"><h1>Hi</h1></div>"));
        assert!(html.contains(r#"<script id="__VELLUM_DATA__" type="application/json">{"x":1}</script>"#));
        assert!(html.contains(r#"<script type="module" src="/entries/page.js"></script>"#));
        assert!(!html.contains(HEAD_MARKER));
        assert!(!html.contains(BODY_MARKER));
    }

    #[test]
    fn test_shell_without_markers_is_rejected() {
        let err = assemble_document("<html></html>", &[], "", &Value::Null, None);
        assert!(err.is_err());
    }

    #[test]
    fn test_render_document_with_template_adapter() {
        let page = Template::new("<p>{msg}</p>").with_head("<title>{msg}</title>").into_component();
        let data = json!({ "msg": "hello" });
        let html = render_document(
            &TemplateAdapter::default(),
            PageRender {
                component: &page,
                layouts: vec![Template::new("<main>{slots.content}</main>").into_component()],
                data: &data,
                url: "/",
                params: Params::new(),
                client_entry_url: None,
                stylesheets: vec!["/app.css".to_string()],
            },
        )
        .unwrap();

        assert!(html.contains("<main><p>hello</p></main>"));
        assert!(html.contains("<title>hello</title>"));
        assert!(!html.contains("type=\"module\""));
        assert!(html.contains(r#"<link rel="stylesheet" href="/app.css">"#));
    }

    #[test]
    fn test_urls_are_attribute_escaped() {
        let page = Template::new("<p>hi</p>").into_component();
        let html = render_document(
            &TemplateAdapter::default(),
            PageRender {
                component: &page,
                layouts: Vec::new(),
                data: &Value::Null,
                url: "/",
                params: Params::new(),
                client_entry_url: Some("/entries/a\"b.js".to_string()),
                stylesheets: vec!["/x.css\" onload=\"alert(1)".to_string()],
            },
        )
        .unwrap();

        assert!(html.contains(r#"<link rel="stylesheet" href="/x.css&quot; onload=&quot;alert(1)">"#));
        assert!(html.contains(r#"<script type="module" src="/entries/a&quot;b.js"></script>"#));
        assert!(!html.contains("onload=\""));
    }
}
