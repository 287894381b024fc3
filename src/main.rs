use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use invoice_dash::commands::{self, App};
use invoice_dash::config::Settings;
use invoice_dash::models::{
    CreateInvoiceInput, InvoiceType, LoginCredentials, RegisterCredentials, UpdateInvoiceInput,
};
use invoice_dash::utils::parse_invoice_date;

#[derive(Parser)]
#[command(name = "invoice-dash", about = "Invoices, uploads and extraction status from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    /// Issued invoice (revenue)
    Issued,
    /// Received invoice (expense)
    Received,
}

impl From<Kind> for InvoiceType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Issued => InvoiceType::Emis,
            Kind::Received => InvoiceType::Recus,
        }
    }
}

#[derive(clap::Args)]
struct InvoiceFields {
    #[arg(long)]
    name: String,
    /// YYYY-MM-DD, DD.MM.YYYY, DD/MM/YYYY or RFC 3339
    #[arg(long)]
    date: String,
    #[arg(long, value_enum)]
    kind: Kind,
    #[arg(long = "tag")]
    tags: Vec<i64>,
}

impl InvoiceFields {
    fn into_input(self) -> Result<CreateInvoiceInput> {
        Ok(CreateInvoiceInput {
            name: self.name,
            date: parse_invoice_date(&self.date)?,
            kind: self.kind.into(),
            tag_ids: (!self.tags.is_empty()).then_some(self.tags),
        })
    }
}

#[derive(Subcommand)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        remember_me: bool,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        accept_terms: bool,
    },
    Logout,
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    Show {
        id: i64,
    },
    /// Create an invoice without a document
    Create {
        #[command(flatten)]
        fields: InvoiceFields,
    },
    /// Create an invoice from a document; lines are extracted by the backend
    Upload {
        file: PathBuf,
        #[command(flatten)]
        fields: InvoiceFields,
    },
    Update {
        id: i64,
        #[command(flatten)]
        fields: InvoiceFields,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    Delete {
        id: i64,
    },
    /// Upload every PDF, CSV or XLSX file of a folder
    Import {
        folder: PathBuf,
        #[arg(long)]
        date: String,
        #[arg(long, value_enum)]
        kind: Kind,
    },
    /// Open the stored document in the default viewer
    Open {
        id: i64,
    },
    Stats {
        /// YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<String>,
    },
    /// Follow processing invoices until their extraction completes
    Watch {
        #[arg(long, allow_negative_numbers = true)]
        interval_ms: Option<i64>,
        #[arg(long)]
        no_poll: bool,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "invoice_dash=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    tracing::debug!(graphql_url = %settings.graphql_url, data_dir = %settings.data_dir.display(), "Settings loaded");
    let app = App::open(settings)?;

    match cli.command {
        Command::Login {
            email,
            password,
            remember_me,
        } => {
            let credentials = LoginCredentials {
                email,
                password,
                remember_me,
            };
            commands::auth::login(&app, credentials).await
        }
        Command::Register {
            email,
            password,
            confirm_password,
            first_name,
            last_name,
            accept_terms,
        } => {
            let credentials = RegisterCredentials {
                email,
                password,
                first_name,
                last_name,
                accept_terms,
            };
            commands::auth::register(&app, credentials, &confirm_password).await
        }
        Command::Logout => commands::auth::logout(&app).await,
        Command::List { page, limit } => commands::invoices::list(&app, page, limit).await,
        Command::Show { id } => commands::invoices::show(&app, id).await,
        Command::Create { fields } => {
            commands::invoices::create(&app, fields.into_input()?, None).await
        }
        Command::Upload { file, fields } => {
            commands::invoices::create(&app, fields.into_input()?, Some(file.as_path())).await
        }
        Command::Update { id, fields, file } => {
            let input = UpdateInvoiceInput {
                id,
                fields: fields.into_input()?,
            };
            commands::invoices::update(&app, input, file.as_deref()).await
        }
        Command::Delete { id } => commands::invoices::delete(&app, id).await,
        Command::Import { folder, date, kind } => {
            let template = CreateInvoiceInput {
                name: String::new(),
                date: parse_invoice_date(&date)?,
                kind: kind.into(),
                tag_ids: None,
            };
            commands::invoices::import(&app, &folder, template).await
        }
        Command::Open { id } => commands::invoices::open_document(&app, id).await,
        Command::Stats { month } => commands::dashboard::stats(&app, month).await,
        Command::Watch {
            interval_ms,
            no_poll,
            limit,
        } => {
            let mut options = app.settings.polling.clone();
            if let Some(interval_ms) = interval_ms {
                options.interval_ms = interval_ms;
            }
            if no_poll {
                options.enabled = false;
            }
            commands::invoices::watch(&app, options, limit).await
        }
    }
}
