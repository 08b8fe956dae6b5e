use clap::Subcommand;
use mindwell_core::storage::Database;

#[derive(Subcommand)]
pub enum RewardsAction {
    /// Current experience and level as JSON
    Show,
    /// Grant experience points by hand
    Award {
        /// Amount of XP
        amount: u64,
    },
}

pub fn run(action: RewardsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        RewardsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&db.progress()?)?);
        }
        RewardsAction::Award { amount } => {
            let progress = db.award_xp(amount)?;
            eprintln!("{}", progress.message());
            println!("{}", serde_json::to_string_pretty(&progress)?);
        }
    }
    Ok(())
}
