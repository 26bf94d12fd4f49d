use std::path::Path;

use skyscale_core::config::SkyscaleConfig;

pub fn init_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!("{} already exists, pass --force to overwrite", output.display());
    }
    std::fs::write(output, SkyscaleConfig::scaffold().to_toml_string()?)?;
    println!("wrote {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skyscale.toml");

        init_config(&path, false).unwrap();
        let config = SkyscaleConfig::from_file(&path).unwrap();
        assert_eq!(config.clouds.len(), 3);

        assert!(init_config(&path, false).is_err());
        assert!(init_config(&path, true).is_ok());
    }
}
