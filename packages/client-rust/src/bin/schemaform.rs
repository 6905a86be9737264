//! `schemaform` command-line driver.
//!
//! Lists, shows, creates, edits and deletes records of any table described
//! by a schema document, using the same renderers an interactive front end
//! would.

use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use schemaform_client::render::{render_form, render_list, render_menu};
use schemaform_client::{
    logging, schema_source_from_config, ClientConfig, DeleteOutcome, FormRenderer,
    HttpEntityGateway, ListRenderer, SchemaLocation,
};
use schemaform_core::menu::schema_path;
use schemaform_core::{
    ConfirmPrompt, EntityGateway, FixedAnswer, FormError, LookupOrdering, SchemaSource,
};

#[derive(Parser)]
#[command(name = "schemaform", version, about = "Schema-driven record browser and editor")]
struct Cli {
    /// Base URL of the entity storage API.
    #[arg(long, env = "SCHEMAFORM_API", default_value = "https://localhost:7277/api")]
    api: String,

    /// Web root or local directory serving `schemas/*.json`.
    #[arg(long, env = "SCHEMAFORM_SCHEMAS", default_value = "http://localhost:5173")]
    schemas: String,

    /// Menu document path, relative to the schema location.
    #[arg(long, env = "SCHEMAFORM_MENU", default_value = "schemas/menu.json")]
    menu: String,

    /// Records per list page.
    #[arg(long, env = "SCHEMAFORM_PAGE_SIZE", default_value_t = 2)]
    page_size: u32,

    /// Request timeout in seconds.
    #[arg(long, env = "SCHEMAFORM_TIMEOUT", default_value_t = 30)]
    timeout_secs: u64,

    /// Accept invalid TLS certificates (local development servers).
    #[arg(long, env = "SCHEMAFORM_INSECURE")]
    insecure: bool,

    /// Which of several overlapping autocomplete responses is shown.
    #[arg(
        long,
        env = "SCHEMAFORM_LOOKUP_ORDERING",
        value_enum,
        default_value_t = OrderingArg::LatestIssued
    )]
    lookup_ordering: OrderingArg,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderingArg {
    LatestIssued,
    LastResolved,
}

impl From<OrderingArg> for LookupOrdering {
    fn from(arg: OrderingArg) -> Self {
        match arg {
            OrderingArg::LatestIssued => Self::LatestIssued,
            OrderingArg::LastResolved => Self::LastResolved,
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the menu entries
    Menu,
    /// Print one page of a table
    List {
        entry: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Print the edit form of a record
    Show { entry: String, id: String },
    /// Create a record
    Create {
        entry: String,
        /// Field value, `name=value`. Repeatable.
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
        /// Resolve a foreign key by name, `field=text`; takes the first match.
        #[arg(long = "pick", value_parser = parse_assignment)]
        pick: Vec<(String, String)>,
    },
    /// Update a record
    Edit {
        entry: String,
        id: String,
        #[arg(long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
        #[arg(long = "pick", value_parser = parse_assignment)]
        pick: Vec<(String, String)>,
    },
    /// Delete a record after confirmation
    Delete {
        entry: String,
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Print the standalone form address of a record
    Open { entry: String, id: String },
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got {raw:?}"))
}

impl Cli {
    fn config(&self) -> ClientConfig {
        ClientConfig {
            api_base_url: self.api.clone(),
            schema_location: SchemaLocation::parse(&self.schemas),
            menu_path: self.menu.clone(),
            page_size: self.page_size,
            request_timeout: Duration::from_secs(self.timeout_secs),
            accept_invalid_certs: self.insecure,
            lookup_ordering: self.lookup_ordering.into(),
        }
    }
}

/// Asks on stderr and reads the answer from stdin.
struct StdinPrompt;

impl ConfirmPrompt for StdinPrompt {
    fn confirm(&self, question: &str) -> bool {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{question} [y/N] ");
        let _ = stderr.flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

struct App {
    config: ClientConfig,
    gateway: Arc<dyn EntityGateway>,
    schemas: Arc<dyn SchemaSource>,
}

impl App {
    /// Maps a menu name, menu fragment or explicit `.json` path to a schema path.
    async fn schema_path(&self, entry: &str) -> String {
        if std::path::Path::new(entry)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            return entry.to_string();
        }
        match self.schemas.load_menu().await {
            Ok(menu) => menu
                .find(entry)
                .map_or_else(|| schema_path(entry), |found| found.schema_path()),
            Err(e) => {
                debug!(error = %e, "menu unavailable, treating entry as a fragment");
                schema_path(entry)
            }
        }
    }

    fn list_renderer(&self, path: String) -> ListRenderer {
        ListRenderer::new(
            self.gateway.clone(),
            self.schemas.clone(),
            path,
            self.config.page_size,
            self.config.lookup_ordering,
        )
    }

    fn form_renderer(&self, path: String, id: Option<String>) -> FormRenderer {
        FormRenderer::new(
            self.gateway.clone(),
            self.schemas.clone(),
            path,
            id,
            self.config.lookup_ordering,
        )
    }

    async fn menu(&self) -> Result<()> {
        let menu = self.schemas.load_menu().await.context("loading menu")?;
        print!("{}", render_menu(&menu, None));
        Ok(())
    }

    async fn list(&self, entry: &str, page: u32) -> Result<()> {
        let list = self.list_renderer(self.schema_path(entry).await);
        list.mount().await?;
        if page != 1 && !list.go_to_page(page).await? {
            bail!("page {page} is out of range (1..={})", list.total_pages());
        }
        print!("{}", render_list(&list.view()));
        Ok(())
    }

    async fn show(&self, entry: &str, id: &str) -> Result<()> {
        let form = self.form_renderer(self.schema_path(entry).await, Some(id.to_string()));
        form.mount().await?;
        print!("{}", render_form(&form.view()));
        Ok(())
    }

    async fn save(
        &self,
        entry: &str,
        id: Option<&str>,
        set: &[(String, String)],
        pick: &[(String, String)],
    ) -> Result<()> {
        let form = self.form_renderer(self.schema_path(entry).await, id.map(str::to_string));
        form.mount().await?;

        for (name, value) in set {
            form.input(name, value.as_str()).await?;
        }
        for (name, text) in pick {
            form.input(name, text.as_str()).await?;
            if !form.select(0)? {
                bail!("no {name} matches {text:?}");
            }
        }

        match form.submit().await {
            Ok(_) => {
                info!(table = form.table(), record_id = ?id, "saved");
                println!("saved");
                Ok(())
            }
            Err(e @ FormError::Validation { .. }) => {
                eprint!("{}", render_form(&form.view()));
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, entry: &str, id: &str, yes: bool) -> Result<()> {
        let list = self.list_renderer(self.schema_path(entry).await);
        let skip = FixedAnswer(true);
        let prompt: &dyn ConfirmPrompt = if yes { &skip } else { &StdinPrompt };
        match list.delete(id, prompt).await? {
            DeleteOutcome::Deleted => println!("deleted {id}"),
            DeleteOutcome::Declined => println!("kept {id}"),
        }
        Ok(())
    }

    async fn open(&self, entry: &str, id: &str) -> Result<()> {
        let list = self.list_renderer(self.schema_path(entry).await);
        println!("{}", list.open_in_window(id).address());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_json);

    let config = cli.config();
    config.validate().context("invalid configuration")?;
    if let SchemaLocation::Directory(dir) = &config.schema_location {
        if !dir.is_dir() {
            bail!("schema directory {} does not exist", dir.display());
        }
    }

    let gateway = HttpEntityGateway::from_config(&config).context("building entity gateway")?;
    debug!(api = %gateway.base_url(), "entity gateway ready");
    let gateway: Arc<dyn EntityGateway> = Arc::new(gateway);
    let schemas = schema_source_from_config(&config).context("building schema source")?;
    let app = App {
        config,
        gateway,
        schemas,
    };

    match &cli.cmd {
        Cmd::Menu => app.menu().await,
        Cmd::List { entry, page } => app.list(entry, *page).await,
        Cmd::Show { entry, id } => app.show(entry, id).await,
        Cmd::Create { entry, set, pick } => app.save(entry, None, set, pick).await,
        Cmd::Edit {
            entry,
            id,
            set,
            pick,
        } => app.save(entry, Some(id), set, pick).await,
        Cmd::Delete { entry, id, yes } => app.delete(entry, id, *yes).await,
        Cmd::Open { entry, id } => app.open(entry, id).await,
    }
}
