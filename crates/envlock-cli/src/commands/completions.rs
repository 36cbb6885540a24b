use super::EXIT_SUCCESS;
use clap::CommandFactory;
use clap_complete::Shell;
use std::io::Write;

pub fn run<C: CommandFactory>(shell: Shell) -> Result<u8, String> {
    write_completions::<C>(shell, &mut std::io::stdout())
}

fn write_completions<C: CommandFactory>(shell: Shell, out: &mut dyn Write) -> Result<u8, String> {
    let mut cmd = C::command();
    let name = cmd.get_name().to_owned();
    clap_complete::generate(shell, &mut cmd, name, out);
    out.flush().map_err(|e| format!("failed to write completions: {e}"))?;
    Ok(EXIT_SUCCESS)
}
