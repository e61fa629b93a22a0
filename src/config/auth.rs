use std::process::Command;

use serde::Deserialize;

#[derive(Deserialize)]
pub struct CommandAuthConfig {
    token_cmd: String,
}

impl CommandAuthConfig {
    /// Runs `token_cmd` and takes its stdout as the OAuth bearer token.
    pub fn access_token(&self) -> String {
        let mut cmd_parts = self.token_cmd.split(' ');
        let mut cmd = Command::new(cmd_parts.next().expect("token_cmd should specify a program"));
        for part in cmd_parts {
            cmd.arg(part);
        }
        let output = cmd.output().expect("token_cmd should be executable");

        assert!(
            !output.stdout.is_empty(),
            "could not retrieve access token from token_cmd"
        );

        String::from_utf8(output.stdout)
            .expect("token_cmd should evaluate to an access token")
            .trim_end()
            .to_string()
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
pub enum AuthConfig {
    Command(CommandAuthConfig),
}

impl AuthConfig {
    pub fn access_token(&self) -> String {
        match self {
            Self::Command(command) => command.access_token(),
        }
    }
}
