use anyhow::{Result, bail};
use secrecy::{ExposeSecret, SecretString};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, stderr, stdin,
};

/// Line-oriented questions on stderr, answers read from stdin.
pub struct Prompt<R> {
    lines: Lines<R>,
}

impl Prompt<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Prompt<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Asks until a non-empty answer arrives.
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        loop {
            let mut err = stderr();
            err.write_all(format!("{question}: ").as_bytes()).await?;
            err.flush().await?;

            let Some(line) = self.lines.next_line().await? else {
                bail!("input closed while waiting for: {question}");
            };
            let answer = line.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
        }
    }

    /// Prints an informational line for the person at the terminal.
    pub async fn say(&self, message: &str) -> Result<()> {
        let mut err = stderr();
        err.write_all(format!("{message}\n").as_bytes()).await?;
        err.flush().await?;
        Ok(())
    }

    pub async fn secret(&mut self, question: &str) -> Result<SecretString> {
        self.ask(question).await.map(SecretString::from)
    }

    /// Asks twice and insists both answers match.
    pub async fn new_secret(&mut self, question: &str) -> Result<SecretString> {
        let first = self.secret(question).await?;
        let second = self.secret("Repeat to confirm").await?;
        if first.expose_secret() != second.expose_secret() {
            bail!("the two entries do not match");
        }
        Ok(first)
    }
}
