//! `farm_investment` is a Rust library for screening investments in dairy farms.
//!
//! Given the loan that finances an expansion and a year-by-year table of operating
//! assumptions (herd size, yield per cow, milk price and cost), it computes:
//! - the contractual repayment schedule, in one of the two main Brazilian systems:
//!   - **SAC (Sistema de Amortização Constante)**: fixed amortization, declining
//!     installments (annual payments).
//!   - **Price (Sistema Francês de Amortização)**: fixed installments (monthly payments).
//! - the free cash flow to equity (FCFE) of every projected year, net of debt service;
//! - the Net Present Value, Internal Rate of Return and discounted payback of the project.
//!
//! Every result is a pure function of its inputs: change an assumption and evaluate again.
//!
//! ## Usage
//!
//! Add `farm_investment` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! farm_investment = "0.1.0"
//! rust_decimal = "1.39.0"
//! rust_decimal_macros = "1.39.0"
//! ```
//!
//! Then build a [`Scenario`] and call [`evaluate_scenario`]:
//!
//! ```rust
//! use farm_investment::{evaluate_scenario, EngineConfig, Scenario};
//!
//! fn main() {
//!     let scenario = Scenario::base_case();
//!
//!     match evaluate_scenario(&scenario, &EngineConfig::default()) {
//!         Ok(report) => {
//!             println!("NPV:     {:.2}", report.evaluation.npv);
//!             if let Some(irr) = &report.evaluation.irr {
//!                 println!("IRR:     {:.2}%", irr.rate_percent);
//!             }
//!             println!("Payback: {} years", report.evaluation.payback.periods());
//!         }
//!         Err(e) => {
//!             eprintln!("Error evaluating scenario: {}", e);
//!         }
//!     }
//! }
//! ```
//!
//! The individual stages are available on their own as well:
//!
//! ```rust
//! use farm_investment::{npv, irr, IrrSolverConfig};
//! use rust_decimal_macros::dec;
//!
//! let flows = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
//! let value = npv(dec!(10), &flows).unwrap();
//! let rate = irr(&flows, &IrrSolverConfig::default()).unwrap();
//! assert!(value < dec!(0));
//! assert!(rate.rate_percent < dec!(10));
//! ```

pub mod amortization;
pub mod cash_flow;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod historical;
pub mod report;
pub mod scenario;
pub mod types;

pub use amortization::{
    AmortizationRow, AmortizationSchedule, AmortizationSystem, calculate_amortization,
    calculate_price_schedule, calculate_sac_schedule,
};
pub use cash_flow::{CashFlowResult, RepaymentWindow, investment_flows, project_cash_flows};
pub use config::{ConfigError, EngineConfig, IrrSolverConfig, ProjectionDefaults};
pub use error::{EngineError, EngineResult};
pub use evaluation::{
    EvaluationResult, IrrSolution, IrrStatus, Payback, discounted_flows, evaluate, irr, npv,
    payback,
};
pub use historical::{HistoricalAverages, HistoricalPriceSource, InMemoryHistory, seed_first_year};
pub use report::{CashFlowAnalysisRow, ScenarioSummary, build_cash_flow_analysis, summarize};
pub use scenario::{Scenario, ScenarioReport, default_assumptions, evaluate_scenario, evaluate_scenarios};
pub use types::{InvestmentParameters, PaymentFrequency, YearlyAssumption};
