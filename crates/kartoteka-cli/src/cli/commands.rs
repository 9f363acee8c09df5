//! # CLI Layer
//!
//! The only place that knows about stdout, stderr and exit codes.
//!
//! 1. Parse arguments ([`super::setup`]).
//! 2. Resolve paths and load configuration, then start logging with the
//!    configured filter (`-v` or `KARTOTEKA_ENV=dev` switch to debug).
//! 3. Build the storage context and dispatch.
//! 4. Print through [`super::render`].

use super::render;
use super::setup::{
    AppointmentCommands, BackupCommands, Cli, Commands, PatientCommands, ReportCommands,
    TypeCommands,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use kartoteka::config::{AppPaths, KartotekaConfig, Mode};
use kartoteka::init::{build_context, KartotekaContext, Storage};
use kartoteka::model::{Appointment, Patient};
use kartoteka::SaveOutcome;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let paths = AppPaths::resolve()?;
    let config = KartotekaConfig::load(&paths.config_file())?;
    init_logging(&config, cli.verbose || Mode::from_env() == Mode::Dev);
    debug!("config dir {}", paths.config_dir.display());

    let ctx = build_context(config, paths)?;
    let Some(command) = cli.command else {
        return handle_status(&ctx);
    };

    match command {
        Commands::Init { path } => handle_init(&ctx.storage, &path),
        Commands::Status => handle_status(&ctx),
        Commands::Patients(cmd) => handle_patients(&ctx.storage, cmd),
        Commands::Appointments(cmd) => handle_appointments(&ctx.storage, cmd),
        Commands::Reports(cmd) => handle_reports(&ctx.storage, cmd),
        Commands::Types(cmd) => handle_types(&ctx.storage, cmd),
        Commands::Backup(cmd) => handle_backup(&ctx.storage, cmd),
        Commands::Migrate { path } => {
            ctx.storage.migrate_data_folder(&path)?;
            println!("Data folder moved to {}", path.display());
            Ok(())
        }
        Commands::Logs { audit } => {
            if audit {
                print!("{}", render::audit_log(&ctx.storage.get_audit_logs()));
            } else {
                print!("{}", render::system_log(&ctx.storage.get_system_logs()));
            }
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&ctx.config)?);
            Ok(())
        }
    }
}

fn init_logging(config: &KartotekaConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Print the warning for a degraded save; a failed save is an error.
fn report_outcome(outcome: &SaveOutcome) -> Result<()> {
    if !outcome.succeeded() {
        bail!("the record could not be saved");
    }
    if let Some(warning) = render::outcome_warning(outcome) {
        eprintln!("{}", warning);
    }
    Ok(())
}

fn handle_init(storage: &Storage, path: &std::path::Path) -> Result<()> {
    if !storage.initialize(path) {
        bail!("could not initialize data folder {}", path.display());
    }
    if let Some(admin) = storage.ensure_default_users()? {
        println!("Created default administrator {}", admin.record.email);
    }
    println!("Data folder ready at {}", path.display());
    Ok(())
}

fn handle_status(ctx: &KartotekaContext) -> Result<()> {
    let storage = &ctx.storage;
    println!("State:        {}", render::state(storage.state()));
    match storage.base_path().or_else(|| storage.data_folder()) {
        Some(folder) => println!("Data folder:  {}", folder.display()),
        None => println!("Data folder:  -"),
    }
    println!("Patients:     {}", storage.get_patients().len());
    println!("Appointments: {}", storage.get_appointments().len());
    println!("Reports:      {}", storage.get_reports().len());
    println!("Users:        {}", storage.get_users().len());
    Ok(())
}

fn handle_patients(storage: &Storage, cmd: PatientCommands) -> Result<()> {
    match cmd {
        PatientCommands::List => print!("{}", render::patients(&storage.get_patients())),
        PatientCommands::Show { id } => {
            let patient = storage
                .get_patient(&id)
                .ok_or_else(|| anyhow!("no patient with id {}", id))?;
            println!("{}", serde_json::to_string_pretty(&patient)?);
        }
        PatientCommands::Add {
            first,
            last,
            jmbg,
            dob,
            phone,
        } => {
            let mut patient = Patient::new(&first, &last);
            patient.jmbg = jmbg;
            patient.date_of_birth = dob;
            patient.phone = phone;
            let saved = storage.save_patient(patient);
            report_outcome(&saved.outcome)?;
            print!("{}", render::patients(&[saved.record]));
        }
        PatientCommands::History { id } => {
            let history = storage.get_patient_history(&id);
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
    }
    Ok(())
}

fn handle_appointments(storage: &Storage, cmd: AppointmentCommands) -> Result<()> {
    match cmd {
        AppointmentCommands::List { date } => {
            let list = match date {
                Some(day) => storage.get_appointments_on(day),
                None => storage.get_appointments(),
            };
            print!("{}", render::appointments(&list));
        }
        AppointmentCommands::Add {
            date,
            time,
            patient,
            examination,
        } => {
            let record = storage
                .get_patient(&patient)
                .ok_or_else(|| anyhow!("no patient with id {}", patient))?;
            let mut appointment = Appointment::new(date, &time)
                .for_patient(patient, &record.display_name());
            appointment.examination_type = examination;
            let saved = storage.save_appointment(appointment);
            report_outcome(&saved.outcome)?;
            print!("{}", render::appointments(&[saved.record]));
        }
        AppointmentCommands::Cancel { id, reason } => {
            let saved = storage
                .cancel_appointment(&id, &reason)
                .with_context(|| format!("cancelling appointment {}", id))?;
            report_outcome(&saved.outcome)?;
            print!("{}", render::appointments(&[saved.record]));
        }
        AppointmentCommands::Complete { id } => {
            let saved = storage
                .complete_appointment(&id)
                .with_context(|| format!("completing appointment {}", id))?;
            report_outcome(&saved.outcome)?;
            print!("{}", render::appointments(&[saved.record]));
        }
    }
    Ok(())
}

fn handle_reports(storage: &Storage, cmd: ReportCommands) -> Result<()> {
    match cmd {
        ReportCommands::List { patient } => {
            let list = match patient {
                Some(id) => storage.get_patient_reports(&id),
                None => storage.get_reports(),
            };
            print!("{}", render::reports(&list));
        }
        ReportCommands::Verify { id, by } => {
            let saved = storage
                .verify_report(&id, &by)
                .with_context(|| format!("verifying report {}", id))?;
            report_outcome(&saved.outcome)?;
            print!("{}", render::reports(&[saved.record]));
        }
    }
    Ok(())
}

fn handle_types(storage: &Storage, cmd: TypeCommands) -> Result<()> {
    match cmd {
        TypeCommands::List => print!(
            "{}",
            render::examination_types(&storage.get_examination_types())
        ),
        TypeCommands::Export => println!("{}", storage.export_examination_types()?),
        TypeCommands::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let outcome = storage.import_examination_types(&json)?;
            report_outcome(&outcome)?;
            println!(
                "Imported {} examination types",
                storage.get_examination_types().len()
            );
        }
        TypeCommands::Revert => {
            let (types, outcome) = storage.revert_examination_types()?;
            report_outcome(&outcome)?;
            print!("{}", render::examination_types(&types));
        }
    }
    Ok(())
}

fn handle_backup(storage: &Storage, cmd: BackupCommands) -> Result<()> {
    match cmd {
        BackupCommands::Create => {
            let path = storage.create_backup()?;
            println!("Backup written to {}", path.display());
        }
        BackupCommands::List => {
            let mut names = storage.list_backups()?;
            names.reverse();
            for name in names {
                println!("{}", name);
            }
        }
        BackupCommands::Delete { name } => {
            if !storage.delete_backup(&name)? {
                bail!("no backup named {}", name);
            }
            println!("Deleted {}", name);
        }
    }
    Ok(())
}
