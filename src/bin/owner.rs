//! fincrypt-owner: data owner client
//!
//! Encrypts income and expense figures locally, sends them to a compute
//! party and decrypts the budget results it returns.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::net::TcpStream;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fincrypt::session::{FinancialInputs, OwnerSession};
use fincrypt::{OwnerConfig, ParamPreset, SessionVariant};

#[derive(Parser)]
#[command(name = "fincrypt-owner")]
#[command(about = "Encrypt a budget, have it computed remotely, decrypt the results")]
#[command(version)]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Compute party address
    #[arg(long)]
    connect: Option<String>,

    /// Session variant
    #[arg(long, default_value = "budget")]
    variant: SessionVariant,

    /// Parameter preset (secure-d2048 or insecure-d256)
    #[arg(long)]
    preset: Option<ParamPreset>,

    /// Fixed-point scale factor
    #[arg(long)]
    scale_factor: Option<u64>,

    /// Income amount (repeatable)
    #[arg(long = "income", allow_negative_numbers = true)]
    income: Vec<f64>,

    /// Expense amount (repeatable)
    #[arg(long = "expense", allow_negative_numbers = true)]
    expense: Vec<f64>,

    /// Savings goal (goal-tracking)
    #[arg(long, allow_negative_numbers = true)]
    goal: Option<f64>,

    /// Essential expense amount (repeatable, goal-tracking)
    #[arg(long = "essential", allow_negative_numbers = true)]
    essential: Vec<f64>,

    /// Non-essential expense amount (repeatable, goal-tracking)
    #[arg(long = "non-essential", allow_negative_numbers = true)]
    non_essential: Vec<f64>,
}

impl Args {
    fn owner_config(&self) -> Result<OwnerConfig> {
        let mut config = match &self.config {
            Some(path) => OwnerConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => OwnerConfig::default(),
        };
        if let Some(connect) = &self.connect {
            config.connect = connect.clone();
        }
        if let Some(preset) = self.preset {
            config.preset = preset;
        }
        if let Some(scale_factor) = self.scale_factor {
            config.scale_factor = scale_factor;
        }
        config.validate().wrap_err("Invalid configuration")?;
        Ok(config)
    }

    /// Take amounts from the flags, prompting for whatever is missing
    fn financial_inputs(&self) -> Result<FinancialInputs> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut ask = |given: &[f64], label: &str| -> Result<Vec<f64>> {
            if given.is_empty() {
                prompt_amounts(&mut input, &mut io::stdout(), label)
            } else {
                Ok(given.to_vec())
            }
        };

        let inputs = match self.variant {
            SessionVariant::Budget => FinancialInputs::Budget {
                income: total(&ask(&self.income, "income")?),
                expense: total(&ask(&self.expense, "expense")?),
            },
            SessionVariant::GoalTracking => {
                let total_income = total(&ask(&self.income, "income")?);
                let goal: Vec<f64> = self.goal.into_iter().collect();
                FinancialInputs::GoalTracking {
                    total_income,
                    savings_goal: total(&ask(&goal, "savings goal")?),
                    essential_expenses: total(&ask(&self.essential, "essential expense")?),
                    non_essential_expenses: total(&ask(&self.non_essential, "non-essential expense")?),
                }
            }
            SessionVariant::Itemized => FinancialInputs::Itemized {
                income_items: ask(&self.income, "income")?,
                expense_items: ask(&self.expense, "expense")?,
            },
        };
        Ok(inputs)
    }
}

fn total(amounts: &[f64]) -> f64 {
    amounts.iter().sum()
}

/// Read amounts one per line until `done` or end of input
///
/// Lines that are not finite numbers are reported and skipped.
fn prompt_amounts<R: BufRead, W: Write>(input: &mut R, out: &mut W, label: &str) -> Result<Vec<f64>> {
    writeln!(out, "Enter {} amounts, one per line ('done' to finish):", label)?;
    let mut amounts = Vec::new();
    let mut line = String::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let entry = line.trim();
        if entry.eq_ignore_ascii_case("done") {
            break;
        }
        if entry.is_empty() {
            continue;
        }
        match entry.parse::<f64>() {
            Ok(amount) if amount.is_finite() => amounts.push(amount),
            _ => writeln!(out, "'{}' is not a valid amount, skipped", entry)?,
        }
    }
    Ok(amounts)
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = args.owner_config()?;
    let inputs = args.financial_inputs()?;

    info!("fincrypt owner");
    info!("Compute party: {}", config.connect);
    info!("Variant: {}", args.variant);
    info!("Preset: {}", config.preset);

    let stream = TcpStream::connect(&config.connect)
        .await
        .with_context(|| format!("Failed to connect to {}", config.connect))?;

    let start = Instant::now();
    let pb = spinner("Generating keys...")?;
    let mut session = OwnerSession::new(stream, &config, args.variant).wrap_err("Failed to set up session")?;
    pb.finish_with_message("Keys ready");
    info!("Key generation: {:.2?}", start.elapsed());

    session.handshake().await.wrap_err("Handshake failed")?;
    session.submit(&inputs).await.wrap_err("Failed to submit inputs")?;

    let pb = spinner("Waiting for results...")?;
    let report = session.collect().await.wrap_err("Failed to collect results")?;
    pb.finish_with_message("Results received");
    session.finish().await?;

    info!("Session time: {:.2?}", start.elapsed());

    println!();
    print!("{}", report);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_skips_invalid_lines() {
        let mut input = io::Cursor::new("100.50\nabc\n\n-20\ninf\ndone\n999\n");
        let mut out = Vec::new();
        let amounts = prompt_amounts(&mut input, &mut out, "income").unwrap();
        assert_eq!(amounts, vec![100.50, -20.0]);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("'abc' is not a valid amount"));
        assert!(printed.contains("'inf' is not a valid amount"));
    }

    #[test]
    fn test_prompt_stops_at_end_of_input() {
        let mut input = io::Cursor::new("5\n6");
        let amounts = prompt_amounts(&mut input, &mut io::sink(), "expense").unwrap();
        assert_eq!(amounts, vec![5.0, 6.0]);
    }
}
