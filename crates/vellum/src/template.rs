use crate::adapter::{Adapter, Component, RenderContext};
use crate::document::{js_string, DATA_SCRIPT_ID};
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// Placeholder a layout uses for its child markup
pub const SLOT_CONTENT: &str = "{slots.content}";

/// HTML template component understood by [`TemplateAdapter`]
///
/// `{name}` interpolates a field of the page data (`{user.name}` walks nested
/// objects), `{params.name}` a route parameter and `{url}` the request path.
/// Layouts place their child markup with `{slots.content}`. Unknown
/// placeholders are left as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    pub body: String,
    pub head: Vec<String>,
}

impl Template {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            head: Vec::new(),
        }
    }

    /// Adds head markup; placeholders are interpolated like the body
    pub fn with_head(mut self, markup: impl Into<String>) -> Self {
        self.head.push(markup.into());
        self
    }

    /// Wraps the template as an opaque component
    pub fn into_component(self) -> Component {
        Arc::new(self)
    }
}

/// Adapter for server-only HTML templates
///
/// Pages render to plain HTML; the client wrapper only calls an optional
/// `hydrate(container, data)` export of the page module.
#[derive(Debug, Clone)]
pub struct TemplateAdapter {
    extensions: Vec<String>,
}

impl Default for TemplateAdapter {
    fn default() -> Self {
        Self::new(["html", "js", "ts"])
    }
}

impl TemplateAdapter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }
}

impl Adapter for TemplateAdapter {
    fn name(&self) -> &str {
        "template"
    }

    fn file_extensions(&self) -> Vec<String> {
        self.extensions.clone()
    }

    fn render_to_html(
        &self,
        component: &Component,
        data: &Value,
        ctx: &mut RenderContext,
    ) -> Result<String> {
        let page = as_template(component)?;
        let mut html = interpolate(&page.body, data, ctx);
        let mut head: Vec<String> = page.head.iter().map(|h| interpolate(h, data, ctx)).collect();

        for layout in ctx.layouts.iter().rev() {
            let layout = as_template(layout)?;
            head.extend(layout.head.iter().map(|h| interpolate(h, data, ctx)));
            html = interpolate(&layout.body, data, ctx).replace(SLOT_CONTENT, &html);
        }

        for markup in head {
            ctx.push_head(markup);
        }
        Ok(html)
    }

    fn hydration_script(
        &self,
        client_entry_url: &str,
        container_id: &str,
        layout_client_urls: &[String],
    ) -> String {
        let mut script = String::new();
        for (i, url) in layout_client_urls.iter().enumerate() {
            script.push_str(&format!("import * as layout{} from {};\n", i, js_string(url)));
        }
        script.push_str(&format!("import * as page from {};\n\n", js_string(client_entry_url)));
        script.push_str(&format!(
            "const container = document.getElementById({});\n",
            js_string(container_id)
        ));
        script.push_str(&format!(
            "const dataNode = document.getElementById({});\n",
            js_string(DATA_SCRIPT_ID)
        ));
        script.push_str("const data = dataNode ? JSON.parse(dataNode.textContent) : null;\n");
        for i in 0..layout_client_urls.len() {
            script.push_str(&format!(
                "if (typeof layout{0}.hydrate === \"function\") layout{0}.hydrate(container, data);\n",
                i
            ));
        }
        script.push_str("if (typeof page.hydrate === \"function\") page.hydrate(container, data);\n");
        script
    }
}

fn as_template(component: &Component) -> Result<&Template> {
    component
        .downcast_ref::<Template>()
        .ok_or_else(|| anyhow!("template adapter cannot render this component type"))
}

fn interpolate(content: &str, data: &Value, ctx: &RenderContext) -> String {
    static VAR_REGEX: Lazy<Option<Regex>> =
        Lazy::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_\.]*)\}").ok());

    let Some(regex) = VAR_REGEX.as_ref() else {
        return content.to_string();
    };

    regex
        .replace_all(content, |caps: &regex::Captures| {
            let name = &caps[1];
            lookup(name, data, ctx).unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

fn lookup(name: &str, data: &Value, ctx: &RenderContext) -> Option<String> {
    if name == "url" {
        return Some(escape_html(&ctx.url));
    }
    if let Some(param) = name.strip_prefix("params.") {
        return ctx.params.get(param).map(|v| escape_html(v));
    }

    let mut current = data;
    for part in name.split('.') {
        current = current.as_object()?.get(part)?;
    }

    match current {
        Value::String(s) => Some(escape_html(s)),
        Value::Null => Some(String::new()),
        Value::Bool(_) | Value::Number(_) => Some(current.to_string()),
        Value::Array(_) | Value::Object(_) => Some(escape_html(&current.to_string())),
    }
}

/// Escapes for text and quoted attribute positions alike
fn escape_html(text: &str) -> String {
    html_escape::encode_quoted_attribute(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vellum_router::Params;

    fn render(page: Template, layouts: Vec<Template>, data: Value) -> (String, Vec<String>) {
        let adapter = TemplateAdapter::default();
        let mut params = Params::new();
        params.insert("slug".to_string(), "hello".to_string());
        let mut ctx = RenderContext::new("/blog/hello", params)
            .with_layouts(layouts.into_iter().map(Template::into_component).collect());
        let html = adapter
            .render_to_html(&page.into_component(), &data, &mut ctx)
            .unwrap();
        (html, ctx.into_head())
    }

    #[test]
    fn test_simple_interpolation() {
        let (html, _) = render(
            Template::new("<p>Hello, {name}! Age: {age}</p>"),
            Vec::new(),
            json!({ "name": "Alice", "age": 30 }),
        );
        assert_eq!(html, "<p>Hello, Alice! Age: 30</p>");
    }

    #[test]
    fn test_nested_value_params_and_url() {
        let (html, _) = render(
            Template::new("{user.name}|{params.slug}|{url}|{missing}"),
            Vec::new(),
            json!({ "user": { "name": "Bob" } }),
        );
        assert_eq!(html, "Bob|hello|/blog/hello|{missing}");
    }

    #[test]
    fn test_values_are_escaped() {
        let (html, _) = render(
            Template::new("<p>{text}</p>"),
            Vec::new(),
            json!({ "text": "<script>" }),
        );
        assert_eq!(html, "<p>&lt;script&gt;</p>");
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let (html, _) = render(
            Template::new("<a title=\"{title}\" href='{params.slug}'>{url}</a>"),
            Vec::new(),
            json!({ "title": "say \"hi\" & <b>" }),
        );
        assert_eq!(
            html,
            "<a title=\"say &quot;hi&quot; &amp; &lt;b&gt;\" href='hello'>/blog/hello</a>"
        );

        let (html, _) = render(Template::new("{q}"), Vec::new(), json!({ "q": "it's" }));
        assert!(!html.contains('\''));
        assert!(html.starts_with("it&"));
    }

    #[test]
    fn test_layouts_wrap_outermost_last() {
        let (html, head) = render(
            Template::new("<h1>{title}</h1>").with_head("<title>{title}</title>"),
            vec![
                Template::new("<html-root>{slots.content}</html-root>"),
                Template::new("<section>{slots.content}</section>").with_head("<meta name=\"blog\">"),
            ],
            json!({ "title": "Post" }),
        );
        assert_eq!(html, "<html-root><section><h1>Post</h1></section></html-root>");
        assert_eq!(head, vec!["<title>Post</title>", "<meta name=\"blog\">"]);
    }

    #[test]
    fn test_foreign_component_is_an_error() {
        let adapter = TemplateAdapter::default();
        let component: Component = Arc::new(42u32);
        let mut ctx = RenderContext::new("/", Params::new());
        assert!(adapter.render_to_html(&component, &Value::Null, &mut ctx).is_err());
    }

    #[test]
    fn test_hydration_script_imports_page_and_layouts() {
        let script = TemplateAdapter::default().hydration_script(
            "/src/routes/page.html",
            "vellum-root",
            &["/src/routes/layout.html".to_string()],
        );
        assert!(script.contains("import * as layout0 from \"/src/routes/layout.html\";"));
        assert!(script.contains("import * as page from \"/src/routes/page.html\";"));
        assert!(script.contains("getElementById(\"vellum-root\")"));
        assert!(script.contains("getElementById(\"__VELLUM_DATA__\")"));
    }

    #[test]
    fn test_hydration_script_quotes_urls_as_js_strings() {
        let entry = "/src/routes/it's \"new\"\\page.html";
        let script = TemplateAdapter::default().hydration_script(entry, "vellum-root", &[]);

        let line = script
            .lines()
            .find(|l| l.starts_with("import * as page from "))
            .unwrap();
        let literal = line
            .trim_start_matches("import * as page from ")
            .trim_end_matches(';');
        let parsed: String = serde_json::from_str(literal).unwrap();
        assert_eq!(parsed, entry);
    }
}
