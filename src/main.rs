fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Non-interactive TUI smoke test mode (for automated checks).
    // Renders a single frame for a specific page and exits 0.
    // Usage: --tui-smoke or --tui-smoke=language|bootstrap|access|config|connectivity|install|review|finish
    if let Some(arg) = args
        .iter()
        .find(|a| a.as_str() == "--tui-smoke" || a.starts_with("--tui-smoke="))
    {
        let target = arg
            .split_once('=')
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.trim().is_empty());
        bdm_installer::run_tui_smoke(target);
        return;
    }

    // Default: headless TUI wizard. Provisioning targets are servers without
    // a display, so there is no GUI branch.
    bdm_installer::run_tui();
}
