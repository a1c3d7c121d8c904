use crate::spotsync_core::error::Result;
use crate::spotsync_core::exif::MetadataReader;
use crate::spotsync_core::tagging::{
    FormFields, LoadedPhoto, Session, SessionState, TaskRunner, UploadOutcome,
};
use std::io::{BufRead, Write};

/// A choice made on the action prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Save,
    Skip,
    Quit,
}

/// How a tagging run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every photo was handled and the gallery was published.
    Completed,
    /// The operator quit before the end of the batch.
    Quit,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Date,
    Airport,
    Registration,
    Aircraft,
}

const FIELDS: [Field; 4] = [Field::Date, Field::Airport, Field::Registration, Field::Aircraft];

impl Field {
    fn label(self) -> &'static str {
        match self {
            Field::Date => "Date (YYYY-MM-DD)",
            Field::Airport => "Airport ICAO",
            Field::Registration => "Registration",
            Field::Aircraft => "Aircraft Type",
        }
    }

    fn current(self, fields: &FormFields) -> &str {
        match self {
            Field::Date => fields.date(),
            Field::Airport => fields.airport(),
            Field::Registration => fields.registration(),
            Field::Aircraft => fields.aircraft(),
        }
    }

    fn set(self, fields: &mut FormFields, value: &str) {
        match self {
            Field::Date => fields.set_date(value),
            Field::Airport => fields.set_airport(value),
            Field::Registration => fields.set_registration(value),
            Field::Aircraft => fields.set_aircraft(value),
        }
    }
}

/// Line-oriented tagging form.
///
/// Each field is prompted with its pre-filled value in brackets: Enter keeps it,
/// `-` clears it, anything else replaces it. End of input quits.
pub struct Station<'a, R: BufRead, W: Write> {
    input: R,
    output: W,
    reader: &'a mut dyn MetadataReader,
    tasks: &'a mut dyn TaskRunner,
}

impl<'a, R: BufRead, W: Write> Station<'a, R, W> {
    pub fn new(
        input: R,
        output: W,
        reader: &'a mut dyn MetadataReader,
        tasks: &'a mut dyn TaskRunner,
    ) -> Self {
        Station {
            input,
            output,
            reader,
            tasks,
        }
    }

    /// Tag every photo in the session, then regenerate and publish the gallery.
    pub fn run(&mut self, session: &mut Session) -> Result<RunOutcome> {
        while let SessionState::Loaded(_) = session.state() {
            let Some(photo) = session.load(&mut *self.reader) else {
                break;
            };
            self.show(&photo)?;

            if !self.edit_fields(session.fields_mut())? {
                return self.quit();
            }

            match self.prompt_action()? {
                Action::Save => {
                    writeln!(self.output, "  Saving and uploading {} ...", photo.name)?;
                    match session.save(&mut *self.tasks)? {
                        UploadOutcome::Uploaded => {
                            writeln!(self.output, "  Uploaded {}", photo.name)?;
                        }
                        UploadOutcome::Failed(reason) => {
                            writeln!(
                                self.output,
                                "  WARNING: upload of {} failed: {}",
                                photo.name, reason
                            )?;
                        }
                    }
                }
                Action::Skip => session.skip(),
                Action::Quit => return self.quit(),
            }
        }

        self.finish(session)
    }

    fn show(&mut self, photo: &LoadedPhoto) -> Result<()> {
        writeln!(self.output, "\n─────────────────────────────────")?;
        write!(self.output, "[{}/{}] {}", photo.position, photo.total, photo.name)?;
        match photo.display_size {
            Some((w, h)) => writeln!(self.output, " ({}x{})", w, h)?,
            None => writeln!(self.output)?,
        }
        writeln!(self.output, "  {}", photo.path.display())?;
        writeln!(self.output, "─────────────────────────────────")?;
        Ok(())
    }

    /// Prompt for every field. Returns false if input ended.
    fn edit_fields(&mut self, fields: &mut FormFields) -> Result<bool> {
        for field in FIELDS {
            write!(self.output, "  {} [{}]: ", field.label(), field.current(fields))?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(false);
            };
            match line.trim() {
                "" => {}
                "-" => field.set(fields, ""),
                value => field.set(fields, value),
            }
        }
        Ok(true)
    }

    fn prompt_action(&mut self) -> Result<Action> {
        loop {
            writeln!(self.output, "\n  [S]ave & next (Enter)  s[K]ip  [Q]uit")?;
            write!(self.output, "  Choice: ")?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(Action::Quit);
            };
            match line.trim().to_uppercase().as_str() {
                "" | "S" => return Ok(Action::Save),
                "K" => return Ok(Action::Skip),
                "Q" => return Ok(Action::Quit),
                other => writeln!(self.output, "  Unknown choice '{}'", other)?,
            }
        }
    }

    fn quit(&mut self) -> Result<RunOutcome> {
        writeln!(self.output, "\nQuit before the end of the batch; gallery not updated.")?;
        Ok(RunOutcome::Quit)
    }

    fn finish(&mut self, session: &Session) -> Result<RunOutcome> {
        let failed = session.failed_uploads();
        if !failed.is_empty() {
            writeln!(self.output, "\n{} upload(s) failed:", failed.len())?;
            for (name, reason) in failed {
                writeln!(self.output, "  - {}: {}", name, reason)?;
            }
        }

        writeln!(self.output, "\nUpdating gallery and publishing ...")?;
        match session.complete(&mut *self.tasks) {
            Ok(()) => {
                if failed.is_empty() {
                    writeln!(self.output, "All photos uploaded and gallery updated!")?;
                } else {
                    writeln!(self.output, "Gallery updated, but some uploads failed (see above).")?;
                }
                Ok(RunOutcome::Completed)
            }
            Err(e) => {
                writeln!(
                    self.output,
                    "An error occurred during gallery generation or git push:\n{}",
                    e
                )?;
                Err(e)
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}
