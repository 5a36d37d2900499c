//! Subcommand handlers

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use docsign_core::capture::codec::{decode_png, encode_png};
use docsign_core::capture::{extract_pen, to_data_url};
use docsign_core::lifecycle::signing_progress;
use docsign_core::raster::document_image_url;
use docsign_core::{
    Actor, ClientConfig, DocsignError, DocumentSession, FileStore, HttpDocumentApi, Outcome,
    PlacementDraft, PlacementOutcome, SignatureVault,
};
use serde_json::json;
use shared_types::Document;
use tracing::debug;

use crate::{Cli, Command, VaultCommand};

const DEFAULT_STORAGE_DIR: &str = ".docsign";

/// Attach the user-facing message to a library error
fn fail<E: Into<DocsignError>>(e: E) -> anyhow::Error {
    let e: DocsignError = e.into();
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Configuration and local storage for commands that reach the server
struct Client {
    config: ClientConfig,
    storage_dir: PathBuf,
}

fn load_config_file(path: &Path) -> Result<ClientConfig> {
    ClientConfig::from_file(path)
        .with_context(|| format!("loading configuration from {}", path.display()))
}

/// `--storage-dir` (or `DOCSIGN_STORAGE_DIR`) wins over the configured directory
fn resolve_storage_dir(
    config: Option<&ClientConfig>,
    storage_override: Option<PathBuf>,
) -> PathBuf {
    storage_override
        .or_else(|| config.map(|c| c.storage_dir.clone()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR))
}

impl Client {
    fn load(config_path: Option<&Path>, storage_override: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => load_config_file(path)?,
            None => ClientConfig::from_env().context("loading configuration from environment")?,
        };
        let storage_dir = resolve_storage_dir(Some(&config), storage_override);
        Ok(Self {
            config,
            storage_dir,
        })
    }

    fn store(&self) -> Result<FileStore> {
        FileStore::open(&self.storage_dir).map_err(fail)
    }

    async fn open(&self, id: &str) -> Result<(DocumentSession<HttpDocumentApi>, Document)> {
        let api = HttpDocumentApi::from_config(&self.config).map_err(fail)?;
        let actor = Actor::new(&self.config.actor_email, &self.config.actor_name);
        let session = DocumentSession::new(api, actor);
        let doc = settled(session.open(id).await.map_err(fail)?)?;
        Ok((session, doc))
    }
}

fn settled<T>(outcome: Outcome<T>) -> Result<T> {
    outcome
        .applied()
        .ok_or_else(|| anyhow!("the document changed while the action was running"))
}

/// Store for commands that never reach the server. Server settings are
/// optional here, but a configured storage directory is still honoured.
fn local_store(config_path: Option<&Path>, storage_override: Option<PathBuf>) -> Result<FileStore> {
    let config = match config_path {
        Some(path) => Some(load_config_file(path)?),
        None => match ClientConfig::from_env() {
            Ok(config) => Some(config),
            Err(e) => {
                debug!(error = %e, "no server configuration, using default storage");
                None
            }
        },
    };
    let dir = resolve_storage_dir(config.as_ref(), storage_override);
    FileStore::open(&dir).map_err(fail)
}

/// Read a PNG file as an image-data string, optionally reduced to pen ink
fn load_signature(path: &Path, extract: bool) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut surface = decode_png(&bytes).map_err(fail)?;
    if extract {
        extract_pen(&mut surface);
    }
    to_data_url(&surface).map_err(fail)
}

fn summary(
    doc: &Document,
    session: &DocumentSession<HttpDocumentApi>,
    image_base: Option<&str>,
) -> serde_json::Value {
    let progress = signing_progress(doc);
    let tasks: Vec<_> = doc
        .tasks
        .iter()
        .map(|t| {
            json!({
                "role": t.role.to_string(),
                "identifier": t.assigned_user_identifier,
                "name": t.assigned_user_name,
            })
        })
        .collect();
    let actions: Vec<String> = session
        .allowed_actions()
        .into_iter()
        .map(|a| a.to_string())
        .collect();

    json!({
        "id": doc.id,
        "name": doc.name,
        "status": doc.status.as_str(),
        "imageUrl": image_base.and_then(|base| document_image_url(base, doc)),
        "tasks": tasks,
        "signers": progress.signers,
        "signed": progress.signed,
        "allowedActions": actions,
    })
}

fn status_line(doc: &Document) {
    println!("{} is now {}", doc.id, doc.status);
}

pub async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Show { id } => {
            let ctx = Client::load(config_path, cli.storage_dir)?;
            let (session, doc) = ctx.open(&id).await?;
            let image_base = ctx.config.page_image_base.as_deref();
            print_json(&summary(&doc, &session, image_base))?;
        }

        Command::AssignReviewer { id, email } => {
            let ctx = Client::load(config_path, cli.storage_dir)?;
            let (session, _) = ctx.open(&id).await?;
            let doc = settled(session.assign_reviewer(&email).await.map_err(fail)?)?;
            status_line(&doc);
        }

        Command::Approve { id } => {
            let ctx = Client::load(config_path, cli.storage_dir)?;
            let (session, _) = ctx.open(&id).await?;
            let doc = settled(session.approve("").await.map_err(fail)?)?;
            status_line(&doc);
        }

        Command::Sign {
            id,
            image,
            saved,
            extract,
        } => {
            let ctx = Client::load(config_path, cli.storage_dir)?;
            let data = match (image, saved) {
                (Some(path), _) => load_signature(&path, extract)?,
                (None, Some(saved_id)) => {
                    let vault = SignatureVault::open(ctx.store()?);
                    vault
                        .get(&saved_id)
                        .map(|s| s.data.clone())
                        .ok_or_else(|| anyhow!("no saved signature with id {}", saved_id))?
                }
                (None, None) => return Err(anyhow!("either --image or --saved is required")),
            };
            let (session, _) = ctx.open(&id).await?;
            let doc = settled(session.approve(&data).await.map_err(fail)?)?;
            status_line(&doc);
        }

        Command::Reject { id, reason } => {
            let ctx = Client::load(config_path, cli.storage_dir)?;
            let (session, _) = ctx.open(&id).await?;
            let doc = settled(session.reject(&reason).await.map_err(fail)?)?;
            status_line(&doc);
        }

        Command::MarkViewed { id } => {
            let ctx = Client::load(config_path, cli.storage_dir)?;
            let (session, _) = ctx.open(&id).await?;
            session.mark_viewed().await;
        }

        Command::Vault { action } => {
            let store = local_store(config_path, cli.storage_dir)?;
            let mut vault = SignatureVault::open(store);
            match action {
                VaultCommand::List => {
                    let entries: Vec<_> = vault
                        .list()
                        .iter()
                        .map(|s| json!({ "id": s.id, "name": s.name, "createdAt": s.created_at }))
                        .collect();
                    print_json(&json!(entries))?;
                }
                VaultCommand::Add {
                    name,
                    image,
                    extract,
                } => {
                    let data = load_signature(&image, extract)?;
                    let saved = vault.add(&name, &data).map_err(fail)?;
                    println!("{}", saved.id);
                }
                VaultCommand::Remove { id } => {
                    let removed = vault.remove(&id).map_err(fail)?;
                    debug!(signature_id = %removed.id, "removed");
                }
            }
        }

        Command::Extract { input, output } => {
            let bytes = fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            let mut surface = decode_png(&bytes).map_err(fail)?;
            extract_pen(&mut surface);
            let png = encode_png(&surface).map_err(fail)?;
            fs::write(&output, png).with_context(|| format!("writing {}", output.display()))?;
        }

        Command::Place {
            id,
            email,
            name,
            page,
            dx,
            dy,
            dw,
            dh,
        } => {
            let ctx = Client::load(config_path, cli.storage_dir)?;
            let (_, doc) = ctx.open(&id).await?;
            let draft = PlacementDraft::open(ctx.store()?, &doc);

            let field = draft.place_on_page(page, &email, &name).map_err(fail)?;
            if dx != 0.0 || dy != 0.0 {
                draft.drag(&field.id, dx, dy).map_err(fail)?;
            }
            if dw != 0.0 || dh != 0.0 {
                draft.resize(&field.id, dw, dh).map_err(fail)?;
            }
            print_json(&serde_json::to_value(draft.fields())?)?;
        }

        Command::CompletePlacement { id } => {
            let ctx = Client::load(config_path, cli.storage_dir)?;
            let (session, doc) = ctx.open(&id).await?;
            let draft = PlacementDraft::open(ctx.store()?, &doc);

            match settled(session.complete_placement(&draft).await.map_err(fail)?)? {
                PlacementOutcome::Completed(doc) => {
                    println!(
                        "{} now has {} signature field(s)",
                        doc.id,
                        doc.data.signature_fields.len()
                    );
                }
                PlacementOutcome::NothingToSubmit => println!("Nothing to submit for {}", id),
                PlacementOutcome::Suppressed => println!("A submission is already running"),
            }
        }
    }

    Ok(())
}
