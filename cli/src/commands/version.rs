//! `preloader version` command.

use clap::Args;
use preloader_core::Result;

#[derive(Args, Debug)]
pub struct VersionArgs;

/// Build date stamped by the release pipeline.
const BUILD_DATE: &str = match option_env!("PRELOADER_BUILD_DATE") {
    Some(date) => date,
    None => "unknown date",
};

fn version_line() -> String {
    format!(
        "k8s-image-preloader version {} built on {}",
        preloader_core::VERSION,
        BUILD_DATE
    )
}

pub fn execute(_args: &VersionArgs) -> Result<()> {
    println!("{}", version_line());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_line() {
        let line = version_line();
        assert!(line.starts_with(&format!(
            "k8s-image-preloader version {} built on ",
            preloader_core::VERSION
        )));
    }
}
