use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

/// Default environment variable consulted for the passphrase.
pub const PASSPHRASE_ENV: &str = "SSHVAULT_PASSPHRASE";

/// Read the passphrase from the first source that yields one.
///
/// Order: the named environment variable, then piped stdin, then an
/// interactive prompt. `env_var` overrides the default variable name.
pub fn read_passphrase(env_var: Option<&str>, prompt: &str) -> Result<Zeroizing<String>> {
    //  Environment Variable
    //  SSHVAULT_PASSPHRASE="secret" sshvault restore -i backup.enc -o key
    if let Ok(pw) = std::env::var(env_var.unwrap_or(PASSPHRASE_ENV)) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    //  stdin (pipeline)
    //  printf "%s" "$PASSPHRASE" | sshvault restore -i backup.enc -o key
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    }

    //  interactive (TTY)
    if io::stdin().is_terminal() {
        let pw = rpassword::prompt_password(prompt)?;
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    bail!("no passphrase provided")
}

/// Read a passphrase for encryption, with confirmation at a TTY.
///
/// Non-interactive callers supply it once (env var or a single stdin
/// line); at a terminal the passphrase is prompted twice and must match.
pub fn read_new_passphrase(env_var: Option<&str>) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(env_var.unwrap_or(PASSPHRASE_ENV)) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    if !io::stdin().is_terminal() {
        let stdin = io::stdin();
        let mut handle = stdin.lock();

        let mut pw = Zeroizing::new(String::new());
        handle.read_line(&mut pw)?;
        trim_newline(&mut pw);

        if pw.is_empty() {
            bail!("passphrase cannot be empty");
        }

        return Ok(pw);
    }

    let pw1 = Zeroizing::new(rpassword::prompt_password("Enter passphrase for encryption: ")?);
    let pw2 = Zeroizing::new(rpassword::prompt_password("Confirm passphrase: ")?);

    if pw1.is_empty() {
        bail!("passphrase cannot be empty");
    }

    if pw1 != pw2 {
        bail!("passphrases do not match");
    }

    Ok(pw1)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
