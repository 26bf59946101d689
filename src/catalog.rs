//! Named service templates that instances are launched from.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::model::RigConfig;
use crate::error::{suggest, RigError};

/// Mount point of an instance's project directory inside its container.
pub const WORKSPACE_MOUNT: &str = "/workspace";

const PYTHON_IMAGE: &str = "python:3.12-slim";
const DEFAULT_CONTAINER_PORT: u16 = 8000;
const TOOLS_REPO: &str = "https://github.com/Unicorn-Web-Services/UWS-tools";

/// Container entrypoint for the FastAPI templates.
///
/// Arguments: repository URL, folder, app module, port. The folder is
/// fetched from the repository's default branch into `/workspace` unless the
/// project directory already has it, so a restarted container keeps its files.
const FASTAPI_BOOTSTRAP: &str = r#"import io, os, subprocess, sys, tarfile, urllib.request
repo, folder, app, port = sys.argv[1:5]
target = os.path.join("/workspace", folder)
if not os.path.isdir(target):
    print(f"fetching {folder} from {repo}", flush=True)
    archive = urllib.request.urlopen(repo.rstrip("/") + "/archive/HEAD.tar.gz", timeout=120).read()
    with tarfile.open(fileobj=io.BytesIO(archive)) as tar:
        for member in tar.getmembers():
            parts = member.name.split("/", 2)
            if len(parts) == 3 and parts[1] == folder:
                member.name = folder + "/" + parts[2]
                tar.extract(member, "/workspace")
    if not os.path.isdir(target):
        sys.exit(f"{repo} has no folder {folder}")
os.chdir(target)
pip = [sys.executable, "-m", "pip", "install", "--quiet"]
if os.path.isfile("requirements.txt"):
    subprocess.run(pip + ["-r", "requirements.txt"], check=True)
subprocess.run(pip + ["fastapi", "uvicorn", "python-multipart"], check=True)
os.execvp("uvicorn", ["uvicorn", app, "--host", "0.0.0.0", "--port", port])
"#;

/// Where a template's application code comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checkout {
    pub repo_url: String,
    /// Folder of the repository holding the app; lands at `/workspace/<folder>`.
    pub folder: String,
}

/// How to run a template's container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSource {
    pub image: String,
    /// Port the service listens on inside the container.
    pub container_port: u16,
    /// Overrides the image's default command when set.
    pub command: Option<Vec<String>>,
    pub env: BTreeMap<String, String>,
    /// Code fetched into the project directory by the container on first start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout: Option<Checkout>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: String,
    pub source: BuildSource,
    /// Where the port search starts for new instances.
    pub preferred_port: u16,
    pub description: String,
    pub endpoints: Vec<String>,
}

/// Read-only lookup table of templates, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, Template>,
}

/// A FastAPI app from `<folder>` of the tools repository, served by uvicorn.
fn fastapi(
    name: &str,
    folder: &str,
    app_module: &str,
    preferred_port: u16,
    description: &str,
    endpoints: &[&str],
) -> Template {
    let command = vec![
        "python".to_string(),
        "-c".to_string(),
        FASTAPI_BOOTSTRAP.to_string(),
        TOOLS_REPO.to_string(),
        folder.to_string(),
        app_module.to_string(),
        DEFAULT_CONTAINER_PORT.to_string(),
    ];
    Template {
        name: name.to_string(),
        source: BuildSource {
            image: PYTHON_IMAGE.to_string(),
            container_port: DEFAULT_CONTAINER_PORT,
            command: Some(command),
            env: BTreeMap::from([("PYTHONUNBUFFERED".to_string(), "1".to_string())]),
            checkout: Some(Checkout {
                repo_url: TOOLS_REPO.to_string(),
                folder: folder.to_string(),
            }),
        },
        preferred_port,
        description: description.to_string(),
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
    }
}

impl TemplateCatalog {
    /// The templates that ship with svcrig.
    pub fn builtin() -> Self {
        let templates = [
            fastapi(
                "buckets",
                "Buckets",
                "buckets:app",
                8000,
                "S3-like file storage with upload, download and file management",
                &[
                    "/data/upload",
                    "/data/files",
                    "/data/download/{filename}",
                    "/data/delete/{filename}",
                ],
            ),
            fastapi(
                "db",
                "DB",
                "dbEndPoint:app",
                8010,
                "SQL database service with file storage and metadata management",
                &[
                    "/upload/{table_name}",
                    "/files/{table_name}",
                    "/download/{table_name}/{entity_id}",
                    "/delete/{table_name}/{entity_id}",
                ],
            ),
            fastapi(
                "nosql_db",
                "DB_NoSQL",
                "NoSQL_dbEndPoint:app",
                8020,
                "Document database service with storage and querying",
                &[
                    "/nosql/create_collection/{collection_name}",
                    "/nosql/{collection_name}/save",
                    "/nosql/{collection_name}/query",
                    "/nosql/{collection_name}/scan",
                    "/nosql/{collection_name}/get/{entity_id}",
                    "/nosql/{collection_name}/delete/{entity_id}",
                ],
            ),
            fastapi(
                "queue",
                "Queue",
                "QueueEndpoints:App",
                8030,
                "In-memory message queue for asynchronous processing",
                &["/queue", "/queue/{message_id}"],
            ),
            fastapi(
                "secrets",
                "Secrets",
                "SecretsEndpoint:app",
                8040,
                "Secrets management service with encryption",
                &["/secrets/{name}", "/secrets"],
            ),
        ];
        Self::from_templates(templates)
    }

    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
        }
    }

    /// Add the config's templates, replacing built-ins with the same name.
    pub fn with_overrides(mut self, config: &RigConfig) -> Self {
        for (name, t) in &config.templates {
            let template = Template {
                name: name.clone(),
                source: BuildSource {
                    image: t.image.clone(),
                    container_port: t.container_port,
                    command: t.command.clone().map(|c| c.into_vec()),
                    env: t.env.clone(),
                    checkout: None,
                },
                preferred_port: t.port,
                description: t.description.clone(),
                endpoints: t.endpoints.clone(),
            };
            self.templates.insert(name.clone(), template);
        }
        self
    }

    pub fn lookup(&self, name: &str) -> Result<&Template, RigError> {
        self.templates
            .get(name)
            .ok_or_else(|| RigError::TemplateNotFound {
                name: name.to_string(),
                available: self.names().into_iter().map(String::from).collect(),
                suggestion: suggest(name, self.names()),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn builtins_have_distinct_preferred_ports() {
        let catalog = TemplateCatalog::builtin();
        assert_eq!(
            catalog.names(),
            vec!["buckets", "db", "nosql_db", "queue", "secrets"]
        );
        assert_eq!(catalog.lookup("buckets").unwrap().preferred_port, 8000);
        assert_eq!(catalog.lookup("secrets").unwrap().preferred_port, 8040);
        let buckets = &catalog.lookup("buckets").unwrap().source;
        assert_eq!(buckets.container_port, 8000);
    }

    #[test]
    fn builtins_fetch_their_folder_before_serving() {
        let catalog = TemplateCatalog::builtin();
        for template in catalog.iter() {
            let checkout = template.source.checkout.as_ref().unwrap();
            assert_eq!(checkout.repo_url, TOOLS_REPO);
            let command = template.source.command.as_deref().unwrap();
            assert_eq!(&command[..2], ["python", "-c"]);
            assert!(command[2].contains("archive/HEAD.tar.gz"));
            assert!(command[2].contains("os.execvp(\"uvicorn\""));
            assert_eq!(command[3], checkout.repo_url);
            assert_eq!(command[4], checkout.folder);
            assert_eq!(command[6], "8000");
        }
        let queue = catalog.lookup("queue").unwrap();
        assert_eq!(
            queue.source.command.as_deref().unwrap()[4..6],
            ["Queue", "QueueEndpoints:App"]
        );
    }

    #[test]
    fn unknown_template_lists_names_and_suggests() {
        let catalog = TemplateCatalog::builtin();
        let err = catalog.lookup("queues").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
        match err {
            RigError::TemplateNotFound {
                available,
                suggestion,
                ..
            } => {
                assert_eq!(available.len(), 5);
                assert_eq!(suggestion.as_deref(), Some("queue"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn config_templates_add_and_override() {
        let config: RigConfig = toml::from_str(
            r#"
            [templates.echo]
            image = "hashicorp/http-echo"
            port = 9100
            container_port = 5678
            command = ["-text", "hi"]

            [templates.db]
            image = "postgres:16"
            port = 5432
            container_port = 5432
            "#,
        )
        .unwrap();
        let catalog = TemplateCatalog::builtin().with_overrides(&config);

        let echo = catalog.lookup("echo").unwrap();
        assert_eq!(echo.preferred_port, 9100);
        assert_eq!(echo.source.command.as_deref().unwrap(), ["-text", "hi"]);

        let db = catalog.lookup("db").unwrap();
        assert_eq!(db.source.image, "postgres:16");
        assert_eq!(db.source.command, None);
        assert_eq!(db.source.checkout, None);
        assert_eq!(catalog.names().len(), 6);
    }
}
