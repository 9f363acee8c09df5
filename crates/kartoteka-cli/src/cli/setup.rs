use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use kartoteka::model::EntityId;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kartoteka",
    bin_name = "kartoteka",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Clinic records kept as JSON in a folder you choose", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Point kartoteka at a data folder and create its layout
    #[command(display_order = 1)]
    Init { path: PathBuf },

    /// Show storage state and record counts
    #[command(display_order = 2)]
    Status,

    /// Patients
    #[command(subcommand, display_order = 10)]
    Patients(PatientCommands),

    /// Appointments
    #[command(subcommand, alias = "termini", display_order = 11)]
    Appointments(AppointmentCommands),

    /// Medical reports
    #[command(subcommand, display_order = 12)]
    Reports(ReportCommands),

    /// Examination types and prices
    #[command(subcommand, display_order = 13)]
    Types(TypeCommands),

    /// Backups of the data folder, written as tar.gz archives
    #[command(subcommand, display_order = 20)]
    Backup(BackupCommands),

    /// Copy the data folder to a new location and switch to it
    #[command(display_order = 21)]
    Migrate { path: PathBuf },

    /// System log of the data folder
    #[command(display_order = 30)]
    Logs {
        /// Show the audit trail instead
        #[arg(long)]
        audit: bool,
    },

    /// Print the effective configuration
    #[command(display_order = 31)]
    Config,
}

#[derive(Subcommand, Debug)]
pub enum PatientCommands {
    /// List patients
    #[command(alias = "ls")]
    List,

    /// Show one patient as JSON
    Show {
        #[arg(value_parser = parse_id)]
        id: EntityId,
    },

    /// Add a patient
    Add {
        /// First name
        #[arg(long)]
        first: String,

        /// Last name
        #[arg(long)]
        last: String,

        #[arg(long)]
        jmbg: Option<String>,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: Option<NaiveDate>,

        #[arg(long)]
        phone: Option<String>,
    },

    /// Earlier versions of a patient record
    History {
        #[arg(value_parser = parse_id)]
        id: EntityId,
    },
}

#[derive(Subcommand, Debug)]
pub enum AppointmentCommands {
    /// List appointments, optionally for one day
    #[command(alias = "ls")]
    List {
        /// Only this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Schedule an appointment
    Add {
        /// Day (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Time (HH:MM)
        #[arg(long)]
        time: String,

        /// Patient id
        #[arg(long, value_parser = parse_id)]
        patient: EntityId,

        /// Examination type name
        #[arg(long)]
        examination: Option<String>,
    },

    /// Cancel an appointment
    Cancel {
        #[arg(value_parser = parse_id)]
        id: EntityId,

        #[arg(long)]
        reason: String,
    },

    /// Mark an appointment as completed
    Complete {
        #[arg(value_parser = parse_id)]
        id: EntityId,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// List reports, optionally for one patient
    #[command(alias = "ls")]
    List {
        #[arg(long, value_parser = parse_id)]
        patient: Option<EntityId>,
    },

    /// Verify a finalized report
    Verify {
        #[arg(value_parser = parse_id)]
        id: EntityId,

        /// Name recorded as the verifier
        #[arg(long)]
        by: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TypeCommands {
    /// List examination types
    #[command(alias = "ls")]
    List,

    /// Print the price list as JSON
    Export,

    /// Replace the price list from a JSON file
    Import { file: PathBuf },

    /// Restore the previous price list
    Revert,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Archive the data folder as backup_<date>.tar.gz
    Create,

    /// List backups, newest first
    #[command(alias = "ls")]
    List,

    /// Delete a backup by file name
    Delete { name: String },
}

pub fn parse_id(value: &str) -> Result<EntityId, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("id must not be empty".to_string());
    }
    Ok(match value.parse::<i64>() {
        Ok(n) => EntityId::Number(n),
        Err(_) => EntityId::Text(value.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_numeric_and_text_ids() {
        assert_eq!(parse_id("42").unwrap(), EntityId::Number(42));
        assert_eq!(
            parse_id("a1b2").unwrap(),
            EntityId::Text("a1b2".to_string())
        );
        assert!(parse_id("  ").is_err());
    }

    #[test]
    fn test_backup_help_names_archive_format() {
        let mut cli = Cli::command();
        let backup = cli.find_subcommand_mut("backup").unwrap();
        let help = backup.render_long_help().to_string();
        assert!(help.contains("tar.gz archives"));
        assert!(help.contains("backup_<date>.tar.gz"));
    }

    #[test]
    fn test_parse_cancel() {
        let cli = Cli::try_parse_from([
            "kartoteka",
            "appointments",
            "cancel",
            "7",
            "--reason",
            "bolest",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Appointments(AppointmentCommands::Cancel { id, reason })) => {
                assert_eq!(id, EntityId::Number(7));
                assert_eq!(reason, "bolest");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_patient_add_with_date() {
        let cli = Cli::try_parse_from([
            "kartoteka",
            "-v",
            "patients",
            "add",
            "--first",
            "Ana",
            "--last",
            "Marković",
            "--dob",
            "1985-04-12",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Patients(PatientCommands::Add { dob, jmbg, .. })) => {
                assert_eq!(dob, NaiveDate::from_ymd_opt(1985, 4, 12));
                assert!(jmbg.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_bad_date_is_rejected() {
        assert!(Cli::try_parse_from([
            "kartoteka",
            "appointments",
            "list",
            "--date",
            "20.05.2024"
        ])
        .is_err());
    }
}
