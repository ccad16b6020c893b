//! The `prism profiles` command.

use std::path::Path;

use prism_core::Profile;

/// Print every profile with the conversion arguments it produces.
pub fn execute() -> anyhow::Result<()> {
    for profile in Profile::ALL {
        let args: Vec<String> = profile
            .args(Path::new("<input>"), Path::new("<output>"))
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let marker = if profile == Profile::default() {
            " (default)"
        } else {
            ""
        };
        println!("{profile}{marker}: {}", args.join(" "));
    }
    Ok(())
}
