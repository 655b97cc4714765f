use std::process::ExitCode;
use std::sync::Arc;

use rtid::{
    Exchange, HealthReporter, StructuredHealthReporter, SystemConfigLoader, SystemShutdownSignal,
    bootstrap_with,
};

fn main() -> ExitCode {
    let exchange = Arc::new(Exchange::new());
    let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());

    let daemon = match bootstrap_with(&SystemConfigLoader, reporter, &exchange) {
        Ok(daemon) => daemon,
        Err(error) => {
            eprintln!("rtid: {error}");
            return ExitCode::FAILURE;
        }
    };

    match daemon.run_until(&SystemShutdownSignal::new()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("rtid: {error}");
            ExitCode::FAILURE
        }
    }
}
