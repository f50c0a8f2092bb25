//! `pyra doctor` - active health diagnostics.
//!
//! Validates configuration and probes the chain, signer, explorer and
//! scanner so problems surface before a transfer is attempted.

use std::path::Path;

use crate::config::Config;
use crate::providers::Providers;
use crate::providers::health::{HealthState, ProviderHealth, probe_all};

/// Run diagnostic checks and print results.
pub async fn run_doctor_command(config_path: Option<&Path>, strict: bool) -> anyhow::Result<()> {
    println!("Pyra Doctor");
    println!("===========\n");

    let mut passed = 0u32;
    let mut failed = 0u32;

    // ── Configuration checks ──────────────────────────────────

    let config = match Config::from_env_with_toml(config_path) {
        Ok(config) => {
            check(
                "Configuration",
                CheckResult::Pass(format!(
                    "chain {} via {}",
                    config.chain.chain_id,
                    config.chain.backend.as_str()
                )),
                &mut passed,
                &mut failed,
            );
            Some(config)
        }
        Err(e) => {
            check(
                "Configuration",
                CheckResult::Fail(e.to_string()),
                &mut passed,
                &mut failed,
            );
            None
        }
    };

    if let Some(config) = &config {
        check(
            "Dispatch mode",
            check_dispatch_mode(config),
            &mut passed,
            &mut failed,
        );
        check(
            "Gateway port",
            check_gateway_port(&config.gateway.bind_address()),
            &mut passed,
            &mut failed,
        );

        // ── Provider probes ───────────────────────────────────

        match Providers::from_config(config) {
            Ok(providers) => {
                let results = probe_all(
                    &providers,
                    config.chain.chain_id,
                    config.chain.provider_timeout,
                )
                .await;
                for health in &results {
                    check(
                        &format!("{} ({})", health.name, health.provider),
                        probe_result(health),
                        &mut passed,
                        &mut failed,
                    );
                }
            }
            Err(e) => check(
                "Providers",
                CheckResult::Fail(e.to_string()),
                &mut passed,
                &mut failed,
            ),
        }
    }

    // ── Summary ───────────────────────────────────────────────

    println!();
    println!("  {passed} passed, {failed} failed");

    if failed > 0 {
        println!("\n  Some checks failed. Simulated providers need no network access.");
        if strict {
            anyhow::bail!("doctor strict mode failed with {failed} check(s)");
        }
    }

    Ok(())
}

fn check(name: &str, result: CheckResult, passed: &mut u32, failed: &mut u32) {
    match result {
        CheckResult::Pass(detail) => {
            *passed += 1;
            println!("  [pass] {name}: {detail}");
        }
        CheckResult::Fail(detail) => {
            *failed += 1;
            println!("  [FAIL] {name}: {detail}");
        }
        CheckResult::Skip(reason) => {
            println!("  [skip] {name}: {reason}");
        }
    }
}

enum CheckResult {
    Pass(String),
    Fail(String),
    Skip(String),
}

fn probe_result(health: &ProviderHealth) -> CheckResult {
    match health.state {
        HealthState::Healthy => CheckResult::Pass(health.detail.clone()),
        HealthState::Simulated => CheckResult::Skip(format!("simulated: {}", health.detail)),
        HealthState::Degraded | HealthState::Unreachable | HealthState::Timeout => {
            CheckResult::Fail(format!("{}: {}", health.state.as_str(), health.detail))
        }
    }
}

fn check_dispatch_mode(config: &Config) -> CheckResult {
    if config.live_dispatch() {
        return CheckResult::Pass(format!(
            "live transfers from {}",
            config.signer.address.as_deref().unwrap_or_default()
        ));
    }
    if !config.signer.simulate_transactions {
        return CheckResult::Fail(
            "SIMULATE_TRANSACTIONS=false needs CHAIN_BACKEND=rpc and SIGNER_ADDRESS".to_string(),
        );
    }
    CheckResult::Skip("transfers are simulated".to_string())
}

fn check_gateway_port(bind: &str) -> CheckResult {
    match std::net::TcpListener::bind(bind) {
        Ok(listener) => {
            drop(listener);
            CheckResult::Pass(format!("{bind} is available"))
        }
        Err(error) => CheckResult::Fail(format!(
            "{bind} is unavailable ({error}); free the port or change GATEWAY_PORT"
        )),
    }
}

#[cfg(test)]
mod tests {
    use crate::cli::doctor::*;

    fn format_result(r: &CheckResult) -> String {
        match r {
            CheckResult::Pass(s) => format!("Pass({s})"),
            CheckResult::Fail(s) => format!("Fail({s})"),
            CheckResult::Skip(s) => format!("Skip({s})"),
        }
    }

    #[test]
    fn ephemeral_port_is_available() {
        match check_gateway_port("127.0.0.1:0") {
            CheckResult::Pass(_) => {}
            other => panic!("expected Pass, got: {}", format_result(&other)),
        }
    }

    #[test]
    fn occupied_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let bind = listener.local_addr().expect("addr").to_string();
        match check_gateway_port(&bind) {
            CheckResult::Fail(detail) => assert!(detail.contains("GATEWAY_PORT")),
            other => panic!("expected Fail, got: {}", format_result(&other)),
        }
    }

    #[test]
    fn simulated_probe_is_skipped_not_failed() {
        let health = ProviderHealth {
            name: "scanner",
            provider: "simulated".to_string(),
            state: HealthState::Simulated,
            detail: "offline".to_string(),
        };
        assert!(matches!(probe_result(&health), CheckResult::Skip(_)));

        let down = ProviderHealth {
            state: HealthState::Timeout,
            ..health
        };
        match probe_result(&down) {
            CheckResult::Fail(detail) => assert!(detail.starts_with("timeout")),
            other => panic!("expected Fail, got: {}", format_result(&other)),
        }
    }
}
