#[cfg(test)]
mod tests {
    use crate::cli::validation::parse_entry;
    use crate::cli::{Cli, Command, ModeArg};
    use cachet_config::BuildMode;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_parse_entry_valid() {
        assert_eq!(
            parse_entry("app=src/index"),
            Ok(("app".to_string(), "src/index".to_string()))
        );
        assert_eq!(
            parse_entry(" admin = ./src/admin.ts "),
            Ok(("admin".to_string(), "./src/admin.ts".to_string()))
        );
    }

    #[test]
    fn test_parse_entry_invalid() {
        assert!(parse_entry("src/index").is_err());
        assert!(parse_entry("=src/index").is_err());
        assert!(parse_entry("app=").is_err());
        assert!(parse_entry("pages/app=src/index").is_err());
        assert!(parse_entry("..=src/index").is_err());
    }

    #[test]
    fn test_build_with_overrides() {
        let cli = Cli::parse_from([
            "cachet",
            "build",
            "--mode",
            "release",
            "-e",
            "app=src/index",
            "-e",
            "admin=src/admin",
            "--out-dir",
            "public/build",
            "--no-html",
        ]);

        let Command::Build(args) = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(args.overrides.mode, Some(ModeArg::Production));
        assert_eq!(args.overrides.entries.len(), 2);
        assert_eq!(args.overrides.entries[1].0, "admin");
        assert_eq!(args.overrides.out_dir, Some(PathBuf::from("public/build")));
        assert!(args.overrides.no_html);
        assert!(!args.print_manifest);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["cachet", "watch", "--verbose", "--profile", "ci", "--no-check"]);
        assert!(cli.verbose);
        assert_eq!(cli.profile.as_deref(), Some("ci"));
        let Command::Watch(args) = cli.command else {
            panic!("expected watch command");
        };
        assert!(args.no_check);
        assert_eq!(args.debounce, None);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["cachet", "-v", "-q", "build"]).is_err());
    }

    #[test]
    fn test_rejects_malformed_entry() {
        assert!(Cli::try_parse_from(["cachet", "build", "--entry", "src/index"]).is_err());
    }

    #[test]
    fn test_mode_arg_maps_to_build_mode() {
        assert_eq!(BuildMode::from(ModeArg::Development), BuildMode::Development);
        assert_eq!(BuildMode::from(ModeArg::Production), BuildMode::Release);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
