//! `gtif` - CLI for the GTIF 2025 registration client
//!
//! This binary submits registrations, manages the saved draft, shows the
//! event countdown and inspects stored records.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;

use gtif::backend::RecordId;
use gtif::calendar::{event_calendar, write_calendar, CALENDAR_FILE_NAME};
use gtif::cli::{
    CalendarCommand, Cli, Command, ConfigCommand, DraftCommand, EventCommand, RecordsCommand,
    RegisterCommand,
};
use gtif::draft::DraftStore;
use gtif::event::{
    countdown_at, event_end, event_start, format_event_time, status_line, EventStatus,
    EVENT_DESCRIPTION, EVENT_LOCATION, EVENT_SUMMARY, EVENT_TIME_ZONE, ORGANISERS, PROGRAM,
};
use gtif::form::{FormSettings, FAILURE_MESSAGE, SUCCESS_MESSAGE};
use gtif::local_store::FileLocalStore;
use gtif::photo::{PhotoFile, PreviewRegistry};
use gtif::{
    init_logging, Backend, Config, Industry, RegistrationDraft, RegistrationForm, SqliteRecordStore,
    SubmitOutcome,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Register(cmd) => handle_register(&config, cmd).await,
        Command::Draft(cmd) => handle_draft(&config, cmd),
        Command::Industries => {
            handle_industries();
            Ok(())
        }
        Command::Event(cmd) => handle_event(cmd).await,
        Command::Calendar(cmd) => handle_calendar(&cmd),
        Command::Records(cmd) => handle_records(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn draft_store(config: &Config) -> DraftStore {
    let local = FileLocalStore::new(config.local_store_path());
    DraftStore::new(Arc::new(local), config.form.draft_key.clone())
}

async fn handle_register(config: &Config, cmd: RegisterCommand) -> anyhow::Result<()> {
    let backend = Backend::open(config).context("failed to open the backend")?;
    let form = RegistrationForm::new(
        draft_store(config),
        PreviewRegistry::new(),
        FormSettings::from_config(config),
    );

    for edit in cmd.fields.edits() {
        form.edit(edit);
    }

    if let Some(path) = &cmd.photo {
        let photo = PhotoFile::read(path, config.form.max_photo_bytes)
            .with_context(|| format!("failed to read photo {}", path.display()))?;
        if let Err(rejection) = form.pick_photo(photo) {
            bail!("{rejection}");
        }
    }

    match form.submit(&backend).await {
        SubmitOutcome::Submitted(saved) => {
            println!("{SUCCESS_MESSAGE}");
            println!("Registration id: {}", saved.id);
            if !saved.photo_url.is_empty() {
                println!("Photo:           {}", saved.photo_url);
            }
            Ok(())
        }
        SubmitOutcome::Invalid(issue) => bail!("{issue}"),
        SubmitOutcome::Failed => bail!("{FAILURE_MESSAGE}"),
        SubmitOutcome::Busy => bail!("a submission is already in progress"),
    }
}

fn print_draft(draft: &RegistrationDraft) {
    let or_dash = |v: &str| if v.is_empty() { "-".to_string() } else { v.to_string() };
    println!("Full name: {}", or_dash(&draft.full_name));
    println!("Email:     {}", or_dash(&draft.email));
    println!("Company:   {}", or_dash(&draft.company));
    println!(
        "Industry:  {}",
        draft.industry.map_or_else(|| "-".to_string(), |i| i.to_string())
    );
    println!(
        "Role:      {}",
        draft.role.map_or_else(|| "-".to_string(), |r| r.to_string())
    );
    println!("Message:   {}", or_dash(&draft.message));
}

fn handle_draft(config: &Config, cmd: DraftCommand) -> anyhow::Result<()> {
    let store = draft_store(config);
    match cmd {
        DraftCommand::Show { json } => {
            let draft = store.load();
            if json {
                let value = serde_json::json!({
                    "fullName": draft.full_name,
                    "email": draft.email,
                    "company": draft.company,
                    "industry": draft.industry.map(Industry::label),
                    "role": draft.role.map(|r| r.label()),
                    "message": draft.message,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else if draft.is_empty() {
                println!("No saved draft.");
            } else {
                print_draft(&draft);
            }
        }
        DraftCommand::Set(fields) => {
            let draft = fields
                .edits()
                .into_iter()
                .fold(store.load(), |draft, edit| draft.apply(edit));
            store.save(&draft);
            print_draft(&draft);
        }
        DraftCommand::Clear => {
            store.clear();
            println!("Draft cleared.");
        }
    }
    Ok(())
}

fn handle_industries() {
    for industry in Industry::ALL {
        println!("{:<20} {}", industry.slug(), industry.label());
    }
}

fn print_event() {
    println!("{EVENT_SUMMARY}");
    println!("{}", "=".repeat(EVENT_SUMMARY.chars().count()));
    println!("{EVENT_DESCRIPTION}");
    println!();
    println!("Starts:     {}", format_event_time(event_start()));
    println!("Ends:       {}", format_event_time(event_end()));
    println!("Time zone:  {EVENT_TIME_ZONE}");
    println!("Venue:      {EVENT_LOCATION}");
    println!("Organisers: {}", ORGANISERS.join(" & "));
    println!();
    for day in PROGRAM {
        println!("{}", day.title);
        for session in day.sessions {
            println!("  - {session}");
        }
    }
    println!();
}

async fn handle_event(cmd: EventCommand) -> anyhow::Result<()> {
    if cmd.json {
        let value = serde_json::json!({
            "summary": EVENT_SUMMARY,
            "description": EVENT_DESCRIPTION,
            "start": event_start().to_rfc3339(),
            "end": event_end().to_rfc3339(),
            "timeZone": EVENT_TIME_ZONE,
            "location": EVENT_LOCATION,
            "organisers": ORGANISERS,
            "program": PROGRAM,
            "clock": countdown_at(Utc::now()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_event();
    if !cmd.watch {
        println!("{}", status_line(&countdown_at(Utc::now())));
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let clock = countdown_at(Utc::now());
                println!("{}", status_line(&clock));
                if clock.status != EventStatus::Upcoming {
                    return Ok(());
                }
            }
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl-C")?;
                return Ok(());
            }
        }
    }
}

fn handle_calendar(cmd: &CalendarCommand) -> anyhow::Result<()> {
    if cmd.stdout {
        print!("{}", event_calendar(Utc::now()));
        return Ok(());
    }

    let target = cmd
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(CALENDAR_FILE_NAME));
    let path = write_calendar(&target, Utc::now())
        .with_context(|| format!("failed to write {}", target.display()))?;
    println!("Calendar saved to {}", path.display());
    Ok(())
}

fn handle_records(config: &Config, cmd: RecordsCommand) -> anyhow::Result<()> {
    let store = SqliteRecordStore::open(config.database_path())?;
    match cmd {
        RecordsCommand::List { limit, json } => {
            let records = store.get_recent(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No registrations yet.");
            } else {
                for r in &records {
                    println!(
                        "{}  {}  {:<24} {:<28} {:<20} {}",
                        r.id,
                        r.created_at.format("%Y-%m-%d %H:%M"),
                        r.full_name,
                        r.email,
                        r.industry,
                        r.role
                    );
                }
            }
        }
        RecordsCommand::Show { id, json } => {
            let Some(r) = store.get_record(&RecordId(id.clone()))? else {
                bail!("no registration with id {id}");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&r)?);
            } else {
                println!("Id:        {}", r.id);
                println!("Created:   {}", r.created_at.to_rfc3339());
                println!("Full name: {}", r.full_name);
                println!("Email:     {}", r.email);
                println!("Company:   {}", r.company);
                println!("Industry:  {}", r.industry);
                println!("Role:      {}", r.role);
                println!("Message:   {}", r.message);
                println!("Photo:     {}", r.photo_url);
            }
        }
        RecordsCommand::Stats => {
            let stats = store.stats()?;
            let fmt_ts = |ts: Option<chrono::DateTime<Utc>>| {
                ts.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
            };
            println!("Database:      {}", store.path().display());
            println!("Registrations: {}", stats.total_records);
            println!("Oldest:        {}", fmt_ts(stats.oldest_record));
            println!("Newest:        {}", fmt_ts(stats.newest_record));
            println!("Size:          {} bytes", stats.db_size_bytes);
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Data directory:     {}", config.data_dir().display());
                println!("  Database path:      {}", config.database_path().display());
                println!("  Blob directory:     {}", config.blob_dir().display());
                println!("  Local store:        {}", config.local_store_path().display());
                println!();
                println!("[Backend]");
                println!(
                    "  Public base URL:    {}",
                    config.backend.public_base_url.as_deref().unwrap_or("(local files)")
                );
                println!("  Ready timeout (ms): {}", config.backend.ready_timeout_ms);
                println!("  Sign-in retry (ms): {}", config.backend.sign_in_retry_ms);
                println!();
                println!("[Form]");
                println!("  Draft key:          {}", config.form.draft_key);
                println!("  Max photo bytes:    {}", config.form.max_photo_bytes);
                println!("  Notice (ms):        {}", config.form.notice_ms);
                println!("  Rejection (ms):     {}", config.form.rejection_notice_ms);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
