use axum::{http::StatusCode, response::Html};
use std::{collections::HashMap, path::PathBuf, sync::Arc, time::SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

const HEADER_TEMPLATE: &str = "_header.html.liquid";
const FOOTER_TEMPLATE: &str = "_footer.html.liquid";

pub struct TemplateEngine {
    template_dir: PathBuf,
    cache: Arc<RwLock<HashMap<String, CachedTemplate>>>,
}

struct CachedTemplate {
    content: String,
    modified: SystemTime,
}

impl TemplateEngine {
    pub fn new(template_dir: PathBuf) -> Self {
        Self {
            template_dir,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Template source, reloaded when the file changes on disk.
    async fn load_template(&self, path: &str) -> Result<String, String> {
        let template_path = self.template_dir.join(path);

        let metadata = tokio::fs::metadata(&template_path)
            .await
            .map_err(|e| format!("Failed to get metadata for {}: {}", path, e))?;

        let modified = metadata
            .modified()
            .map_err(|e| format!("Failed to get modified time: {}", e))?;

        let mut cache = self.cache.write().await;

        if let Some(cached) = cache.get(path)
            && cached.modified >= modified
        {
            debug!("Using cached template for {}", path);
            return Ok(cached.content.clone());
        }

        info!("Loading template: {}", path);

        let content = tokio::fs::read_to_string(&template_path)
            .await
            .map_err(|e| format!("Failed to read template {}: {}", path, e))?;

        cache.insert(
            path.to_string(),
            CachedTemplate {
                content: content.clone(),
                modified,
            },
        );

        Ok(content)
    }

    fn parse_and_render(source: &str, globals: &liquid::Object) -> Result<String, String> {
        let parser = liquid::ParserBuilder::with_stdlib()
            .build()
            .map_err(|e| format!("Failed to create parser: {}", e))?;

        let template = parser
            .parse(source)
            .map_err(|e| format!("Failed to parse template: {}", e))?;

        template
            .render(globals)
            .map_err(|e| format!("Failed to render template: {}", e))
    }

    /// Render a partial with the page's globals. A missing or broken partial
    /// renders as empty so the page itself still comes out.
    async fn render_partial(&self, name: &str, globals: &liquid::Object) -> String {
        let source = match self.load_template(name).await {
            Ok(source) => source,
            Err(e) => {
                error!("Failed to load {}: {}", name, e);
                return String::new();
            }
        };

        Self::parse_and_render(&source, globals).unwrap_or_else(|e| {
            error!("Failed to render {}: {}", name, e);
            String::new()
        })
    }

    /// Render `template_name` with the shared header and footer injected as
    /// `header` and `footer`.
    pub async fn render_template(
        &self,
        template_name: &str,
        globals: liquid::Object,
    ) -> Result<String, String> {
        let template_content = self.load_template(template_name).await?;

        let header_content = self.render_partial(HEADER_TEMPLATE, &globals).await;
        let footer_content = self.render_partial(FOOTER_TEMPLATE, &globals).await;

        let mut full_globals = globals;
        full_globals.insert(
            "header".into(),
            liquid::model::Value::Scalar(header_content.into()),
        );
        full_globals.insert(
            "footer".into(),
            liquid::model::Value::Scalar(footer_content.into()),
        );

        Self::parse_and_render(&template_content, &full_globals)
    }

    /// `render_template` for handlers: failures become a 500.
    pub async fn render_page(
        &self,
        template_name: &str,
        globals: liquid::Object,
    ) -> Result<Html<String>, StatusCode> {
        match self.render_template(template_name, globals).await {
            Ok(html) => Ok(Html(html)),
            Err(e) => {
                error!("Template rendering error: {}", e);
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(dir: &TempDir, name: &str, content: &str) {
        tokio::fs::write(dir.path().join(name), content).await.unwrap();
    }

    #[tokio::test]
    async fn test_header_and_footer_are_injected() {
        let dir = TempDir::new().unwrap();
        write(&dir, HEADER_TEMPLATE, "<h1>{{ site_name }}</h1>").await;
        write(&dir, FOOTER_TEMPLATE, "<footer>bye</footer>").await;
        write(&dir, "page.html.liquid", "{{ header }}|{{ body }}|{{ footer }}").await;

        let engine = TemplateEngine::new(dir.path().to_path_buf());
        let html = engine
            .render_template(
                "page.html.liquid",
                liquid::object!({ "site_name": "Photos", "body": "hello" }),
            )
            .await
            .unwrap();

        assert_eq!(html, "<h1>Photos</h1>|hello|<footer>bye</footer>");
    }

    #[tokio::test]
    async fn test_missing_partials_render_empty() {
        let dir = TempDir::new().unwrap();
        write(&dir, "page.html.liquid", "[{{ header }}]{{ body }}").await;

        let engine = TemplateEngine::new(dir.path().to_path_buf());
        let html = engine
            .render_template("page.html.liquid", liquid::object!({ "body": "x" }))
            .await
            .unwrap();
        assert_eq!(html, "[]x");
    }

    #[tokio::test]
    async fn test_missing_page_is_server_error() {
        let dir = TempDir::new().unwrap();
        let engine = TemplateEngine::new(dir.path().to_path_buf());

        let result = engine.render_page("nope.html.liquid", liquid::object!({})).await;
        assert_eq!(result.unwrap_err(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_template_reloads_after_change() {
        let dir = TempDir::new().unwrap();
        write(&dir, "page.html.liquid", "one").await;
        let engine = TemplateEngine::new(dir.path().to_path_buf());
        assert_eq!(
            engine.render_template("page.html.liquid", liquid::object!({})).await.unwrap(),
            "one"
        );

        let path = dir.path().join("page.html.liquid");
        tokio::fs::write(&path, "two").await.unwrap();
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert_eq!(
            engine.render_template("page.html.liquid", liquid::object!({})).await.unwrap(),
            "two"
        );
    }
}
