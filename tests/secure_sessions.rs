//! End-to-end sessions at the default secure-d2048 parameters
//!
//! Slower than the d=256 flows in `session_flow.rs`, but these are the
//! parameters real sessions use, and noise behaves differently at d=2048.

use std::sync::Arc;

use tokio::io::duplex;

use fincrypt::session::{run_owner_session, serve_connection, FinancialInputs, SessionReport};
use fincrypt::{Error, OwnerConfig, ParamPreset, ServerConfig, SessionVariant};

const BUFFER: usize = 8 << 20;

const INCOME_ITEMS: [f64; 16] = [
    120.50, 85.25, 99.99, 100.00, 45.75, 60.00, 72.30, 88.80, 91.10, 110.00, 64.40, 70.00, 95.50,
    101.20, 123.20, 100.00,
];

const EXPENSE_ITEMS: [f64; 16] = [
    40.00, 12.99, 8.50, 30.25, 15.00, 22.10, 9.99, 18.00, 25.50, 11.11, 7.75, 14.20, 19.80, 21.00,
    5.55, 16.26,
];

fn itemized() -> FinancialInputs {
    FinancialInputs::Itemized {
        income_items: INCOME_ITEMS.to_vec(),
        expense_items: EXPENSE_ITEMS.to_vec(),
    }
}

async fn session(
    owner: OwnerConfig,
    server: ServerConfig,
    inputs: FinancialInputs,
) -> (fincrypt::Result<SessionReport>, fincrypt::Result<SessionVariant>) {
    assert_eq!(owner.preset, ParamPreset::Secure128D2048);
    let (owner_stream, compute_stream) = duplex(BUFFER);
    tokio::join!(
        run_owner_session(owner_stream, &owner, &inputs),
        serve_connection(compute_stream, Arc::new(server))
    )
}

#[tokio::test]
async fn test_budget_at_d2048() {
    let inputs = FinancialInputs::Budget {
        income: 1500.75,
        expense: 450.50,
    };
    let (report, served) = session(OwnerConfig::default(), ServerConfig::default(), inputs).await;

    assert_eq!(served.unwrap(), SessionVariant::Budget);
    let report = report.unwrap();
    assert_eq!(report.get("net_income"), Some(1050.25));
    assert_eq!(report.get("savings_contribution"), Some(225.1125));
}

#[tokio::test]
async fn test_goal_tracking_at_d2048() {
    let inputs = FinancialInputs::GoalTracking {
        total_income: 1500.75,
        savings_goal: 500.0,
        essential_expenses: 450.50,
        non_essential_expenses: 120.0,
    };
    let (report, served) = session(OwnerConfig::default(), ServerConfig::default(), inputs).await;

    served.unwrap();
    let report = report.unwrap();
    assert_eq!(report.get("total_expenses"), Some(570.5));
    assert_eq!(report.get("net_income"), Some(930.25));
    assert_eq!(report.get("goal_difference"), Some(430.25));
}

#[tokio::test]
async fn test_itemized_sixteen_slots_at_d2048() {
    let (report, served) = session(OwnerConfig::default(), ServerConfig::default(), itemized()).await;

    assert_eq!(served.unwrap(), SessionVariant::Itemized);
    let report = report.unwrap();
    assert_eq!(report.get("total_income"), Some(1427.99));
    assert_eq!(report.get("total_expenses"), Some(278.0));
    assert_eq!(report.get("net_income"), Some(1149.99));
    assert_eq!(report.get("savings_contribution"), Some(214.1985));
}

#[tokio::test]
async fn test_itemized_full_savings_rate_at_d2048() {
    let server = ServerConfig {
        savings_rate: 1.0,
        ..ServerConfig::default()
    };
    let (report, served) = session(OwnerConfig::default(), server, itemized()).await;

    served.unwrap();
    let report = report.unwrap();
    // The whole income is saved: 142799 * 100 at exponent 2
    assert_eq!(report.lines[3].amount.value, 14_279_900);
    assert_eq!(report.get("savings_contribution"), Some(1427.99));
    assert_eq!(report.get("total_income"), Some(1427.99));
}

#[tokio::test]
async fn test_budget_fine_scale_at_d2048() {
    let owner = OwnerConfig {
        scale_factor: 10_000,
        ..OwnerConfig::default()
    };
    let inputs = FinancialInputs::Budget {
        income: 142.50,
        expense: 40.25,
    };
    let (report, served) = session(owner, ServerConfig::default(), inputs).await;

    served.unwrap();
    let report = report.unwrap();
    assert_eq!(report.get("net_income"), Some(102.25));
    // 1425000 * 1500 over 10^8
    assert_eq!(report.lines[1].amount.value, 2_137_500_000);
    assert_eq!(report.get("savings_contribution"), Some(21.375));
}

#[tokio::test]
async fn test_itemized_fine_scale_refused_at_d2048() {
    let owner = OwnerConfig {
        scale_factor: 10_000,
        ..OwnerConfig::default()
    };
    let (report, served) = session(owner, ServerConfig::default(), itemized()).await;

    match served {
        Err(Error::Validation(msg)) => assert!(msg.contains("noise"), "{}", msg),
        other => panic!("expected a noise refusal, got {:?}", other),
    }
    assert!(report.is_err());
}
