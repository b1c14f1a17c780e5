//! A line-oriented voting terminal. One session at a time, driven by
//! commands read from the input.

use log::{debug, info};

use std::fs;
use std::io::{BufRead, Write};

use ballot_box::*;

use crate::vote::{IoSnafu, VoteResult};
use snafu::ResultExt;

const HELP: &str = "\
Voter commands:
  login <code>              start voting with your code
  show                      list the positions and your current choices
  sub <position> <name>     choose a sub-category (empty name to clear)
  pick <position> <name>    choose a candidate (empty name to clear)
  submit                    record your ballot
  new                       hand the terminal to the next voter
Admin commands:
  login <password>          open the admin dashboard
  unlock <password>         confirm the admin password when asked
  tally                     show the leading candidates
  export <path>             save all the ballots as CSV
  wipe, yes, password <p>   clear all the votes (asks for confirmation)
  cancel                    abandon a wipe
Other:
  logout, help, quit";

pub struct Kiosk<'a, R, W> {
    election: &'a Election,
    session: Session,
    input: R,
    output: W,
}

fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    }
}

impl<'a, R: BufRead, W: Write> Kiosk<'a, R, W> {
    pub fn new(election: &'a Election, input: R, output: W) -> Self {
        Kiosk {
            election,
            session: Session::new(election),
            input,
            output,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn say(&mut self, msg: &str) -> VoteResult<()> {
        writeln!(self.output, "{}", msg).context(IoSnafu { path: "<terminal>" })
    }

    fn prompt(&mut self) -> VoteResult<()> {
        let prompt = match self.session.phase() {
            Phase::LoggedOut => "login> ",
            Phase::Voting => "ballot> ",
            Phase::Submitted => "done> ",
            Phase::AdminPending => "unlock> ",
            Phase::AdminUnlocked => "admin> ",
        };
        write!(self.output, "{}", prompt)
            .and_then(|_| self.output.flush())
            .context(IoSnafu { path: "<terminal>" })
    }

    /// Reads and runs commands until `quit` or the end of the input.
    pub fn run(&mut self) -> VoteResult<()> {
        self.say("Type 'help' for the list of commands.")?;
        loop {
            self.prompt()?;
            let mut line = String::new();
            let n = self
                .input
                .read_line(&mut line)
                .context(IoSnafu { path: "<terminal>" })?;
            if n == 0 || !self.handle(line.trim())? {
                break;
            }
        }
        self.session.logout();
        info!("Kiosk: closed");
        Ok(())
    }

    fn report<T>(&mut self, res: Result<T, SessionError>, ok: &str) -> VoteResult<Option<T>> {
        match res {
            Ok(v) => {
                if !ok.is_empty() {
                    self.say(ok)?;
                }
                Ok(Some(v))
            }
            Err(e) => {
                debug!("Kiosk: {:?} error: {}", e.class(), e);
                self.say(&format!("error: {}", e))?;
                Ok(None)
            }
        }
    }

    fn wipe_step(&mut self, res: Result<WipeStep, SessionError>) -> VoteResult<()> {
        let msg = match self.report(res, "")? {
            None => return Ok(()),
            Some(WipeStep::AwaitConfirmation { step, of }) => format!(
                "Really clear ALL votes? Type 'yes' to confirm ({}/{}) or 'cancel'.",
                step, of
            ),
            Some(WipeStep::AwaitSecret) => {
                "Type 'password <wipe password>' to clear all votes, or 'cancel'.".to_string()
            }
            Some(WipeStep::Erase) => "All votes cleared.".to_string(),
        };
        self.say(&msg)
    }

    fn show(&mut self) -> VoteResult<()> {
        if self.session.phase() != Phase::Voting {
            let msg = format!("Nothing to show ({:?}).", self.session.phase());
            return self.say(&msg);
        }
        let mut lines: Vec<String> = Vec::new();
        for pos in self.election.settings().positions.iter() {
            let empty = PendingSelection::default();
            let sel = self.session.selection(&pos.name).unwrap_or(&empty);
            lines.push(format!(
                "{} [{}]",
                pos.name,
                sel.candidate.as_deref().unwrap_or("no choice")
            ));
            let catalog = match self.session.catalogs().and_then(|c| c.catalog(&pos.name)) {
                Some(c) if !c.is_empty() => c,
                _ => {
                    lines.push("  No candidates available".to_string());
                    continue;
                }
            };
            match (pos.mode, sel.subcategory.as_deref()) {
                (SelectionMode::Flat, _) => {
                    lines.push(format!("  candidates: {}", catalog.pooled().join(", ")));
                }
                (SelectionMode::TwoStep, None) => {
                    lines.push(format!(
                        "  sub-categories: {}",
                        catalog.subcategories().join(", ")
                    ));
                }
                (SelectionMode::TwoStep, Some(sub)) => {
                    let cands = catalog.candidates(sub).unwrap_or(&[]).join(", ");
                    lines.push(format!("  {}: {}", sub, cands));
                }
            }
        }
        self.say(&lines.join("\n"))
    }

    fn tally(&mut self) -> VoteResult<()> {
        let res = self.session.tally(self.election);
        let standings = match self.report(res, "")? {
            Some(s) => s,
            None => return Ok(()),
        };
        let mut lines: Vec<String> = Vec::new();
        for pt in standings.iter() {
            lines.push(format!("{}:", pt.position));
            match &pt.standing {
                Standing::NoCandidates => lines.push("  No candidates available".to_string()),
                Standing::NoVotes => lines.push("  No votes yet".to_string()),
                Standing::Ranked(rows) => {
                    for (idx, (name, votes)) in rows.iter().enumerate() {
                        lines.push(format!("  {}. {} ({})", idx + 1, name, votes));
                    }
                }
            }
        }
        self.say(&lines.join("\n"))
    }

    fn export(&mut self, dest: &str) -> VoteResult<()> {
        if dest.is_empty() {
            return self.say("error: export needs a file path");
        }
        let res = self.session.export(self.election);
        if let Some(bytes) = self.report(res, "")? {
            match fs::write(dest, &bytes) {
                Ok(()) => self.say(&format!("Exported {} bytes to {}.", bytes.len(), dest))?,
                Err(e) => self.say(&format!("error: cannot write {}: {}", dest, e))?,
            }
        }
        Ok(())
    }

    /// Runs one command. Returns false when the kiosk should stop.
    fn handle(&mut self, line: &str) -> VoteResult<bool> {
        let (cmd, rest) = split_command(line);
        let election = self.election;
        match cmd {
            "" => {}
            "help" => self.say(HELP)?,
            "quit" | "exit" => return Ok(false),
            "login" => {
                let res = self.session.login(election, rest);
                match self.report(res, "")? {
                    Some(Phase::Voting) => {
                        self.say("Welcome. Type 'show' to see the positions.")?
                    }
                    Some(Phase::AdminPending) => {
                        self.say("Enter the admin password again with 'unlock <password>'.")?
                    }
                    Some(_) => self.say("Admin dashboard unlocked.")?,
                    None => {}
                }
            }
            "unlock" => {
                let res = self.session.unlock_admin(election, rest);
                self.report(res, "Admin dashboard unlocked.")?;
            }
            "show" => self.show()?,
            "sub" | "pick" => {
                let (position, value) = split_command(rest);
                let res = if cmd == "sub" {
                    self.session.choose_subcategory(election, position, value)
                } else {
                    self.session.choose_candidate(election, position, value)
                };
                self.report(res, "ok")?;
            }
            "submit" => {
                let res = self.session.submit(election).map(|b| b.clone());
                if let Some(ballot) = self.report(res, "Ballot recorded:")? {
                    for (pos, cand) in ballot.choices.iter() {
                        self.say(&format!("  {}: {}", pos, cand))?;
                    }
                    self.say("Type 'new' for the next voter.")?;
                }
            }
            "new" => {
                let res = self.session.start_new_session();
                self.report(res, "Ready for the next voter.")?;
            }
            "tally" => self.tally()?,
            "export" => self.export(rest)?,
            "wipe" => {
                let res = self.session.request_wipe();
                self.wipe_step(res)?;
            }
            "yes" => {
                let res = self.session.confirm_wipe(election);
                self.wipe_step(res)?;
            }
            "password" => {
                let res = self.session.submit_wipe_secret(election, rest);
                self.wipe_step(res)?;
            }
            "cancel" => {
                self.session.cancel_wipe();
                self.say("Cancelled.")?;
            }
            "logout" => {
                self.session.logout();
                self.say("Logged out.")?;
            }
            _ => self.say("Unknown command. Type 'help' for the list of commands.")?,
        }
        Ok(true)
    }
}
