use clap::Args;
use serde_json::Value;

use dcf_core::valuation::dcf;
use dcf_core::valuation::parameters::{CashFlowBase, ParameterSet};

use crate::input;

/// Flags that override individual fields of a parameter set
#[derive(Args, Debug, Default)]
pub struct ParameterArgs {
    /// Base-year free cash flow (used when no input file is given)
    #[arg(long)]
    pub base_fcf: Option<f64>,

    /// Per-year growth rates, comma separated (e.g. 0.05,0.04,0.04)
    #[arg(long, value_delimiter = ',')]
    pub growth_rates: Option<Vec<f64>>,

    /// Perpetual growth after the forecast horizon
    #[arg(long)]
    pub terminal_growth: Option<f64>,

    /// Risk-free rate (e.g. 0.035 for 3.5%)
    #[arg(long)]
    pub risk_free_rate: Option<f64>,

    /// Market risk premium
    #[arg(long, alias = "mrp")]
    pub market_risk_premium: Option<f64>,

    /// Corporate tax rate
    #[arg(long)]
    pub tax_rate: Option<f64>,

    /// Levered beta
    #[arg(long)]
    pub beta: Option<f64>,

    /// Externally estimated WACC used to imply beta when none is given
    #[arg(long)]
    pub reference_wacc: Option<f64>,

    /// Debt weight in the capital structure
    #[arg(long)]
    pub debt_weight: Option<f64>,

    /// Equity weight in the capital structure
    #[arg(long)]
    pub equity_weight: Option<f64>,

    /// Pre-tax cost of debt
    #[arg(long)]
    pub cost_of_debt: Option<f64>,

    /// Debt minus cash, subtracted from enterprise value
    #[arg(long)]
    pub net_debt: Option<f64>,

    /// Diluted shares outstanding, for a per-share value
    #[arg(long)]
    pub shares_outstanding: Option<f64>,

    /// Monte Carlo sample count
    #[arg(long)]
    pub num_simulations: Option<u32>,
}

impl ParameterArgs {
    /// Parameter set built from flags alone.
    pub fn build(&self) -> Result<ParameterSet, Box<dyn std::error::Error>> {
        let base_fcf = self
            .base_fcf
            .ok_or("--base-fcf is required (or provide --input)")?;
        let mut params = ParameterSet::with_base_fcf(base_fcf);
        self.apply(&mut params);
        Ok(params)
    }

    /// Overwrite every field that was given on the command line.
    pub fn apply(&self, params: &mut ParameterSet) {
        if let Some(amount) = self.base_fcf {
            params.cash_flow_base = CashFlowBase::FreeCashFlow { amount };
        }
        if let Some(ref rates) = self.growth_rates {
            params.growth_rates = rates.clone();
        }
        if let Some(v) = self.terminal_growth {
            params.terminal_growth = v;
        }
        if let Some(v) = self.risk_free_rate {
            params.risk_free_rate = v;
        }
        if let Some(v) = self.market_risk_premium {
            params.market_risk_premium = v;
        }
        if let Some(v) = self.tax_rate {
            params.tax_rate = v;
        }
        if self.beta.is_some() {
            params.beta = self.beta;
        }
        if self.reference_wacc.is_some() {
            params.reference_wacc = self.reference_wacc;
        }
        if let Some(v) = self.debt_weight {
            params.debt_weight = v;
        }
        if let Some(v) = self.equity_weight {
            params.equity_weight = v;
        }
        if let Some(v) = self.cost_of_debt {
            params.cost_of_debt = v;
        }
        if let Some(v) = self.net_debt {
            params.net_debt = v;
        }
        if self.shares_outstanding.is_some() {
            params.shares_outstanding = self.shares_outstanding;
        }
        if let Some(n) = self.num_simulations {
            params.num_simulations = n;
        }
    }

    /// Read a parameter set from `--input` or stdin, falling back to flags,
    /// then apply flag overrides.
    pub fn load(&self, input: Option<&str>) -> Result<ParameterSet, Box<dyn std::error::Error>> {
        let mut params: ParameterSet = if let Some(path) = input {
            input::file::read_input(path)?
        } else if let Some(data) = input::stdin::read_stdin()? {
            serde_json::from_value(data)?
        } else {
            return self.build();
        };
        self.apply(&mut params);
        Ok(params)
    }
}

/// Arguments for a point valuation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ValueArgs {
    /// Path to a JSON or YAML parameter file
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub params: ParameterArgs,
}

pub fn run_value(args: ValueArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let params = args.params.load(args.input.as_deref())?;
    let result = dcf::value_with_metadata(&params)?;
    Ok(serde_json::to_value(result)?)
}
