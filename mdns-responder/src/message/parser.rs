use super::header::Header;
use super::question::Question;
use super::resource::Record;
use shared::error::{Error, Result};

/// Section of a message the parser is positioned in.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Section {
    #[default]
    NotStarted,
    Questions,
    Answers,
    Authorities,
    Additionals,
    Done,
}

/// Walks an inbound message section by section.
///
/// Each accessor returns [`Error::ErrSectionDone`] once its section is
/// exhausted and moves the parser on to the next one. Any other error means
/// the packet is malformed and the rest of it must not be trusted.
#[derive(Default)]
pub(crate) struct Parser<'a> {
    msg: &'a [u8],
    header: Header,
    section: Section,
    off: usize,
    index: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn start(&mut self, msg: &'a [u8]) -> Result<Header> {
        let (header, off) = Header::unpack(msg)?;
        *self = Parser {
            msg,
            header,
            section: Section::Questions,
            off,
            index: 0,
        };
        Ok(header)
    }

    pub(crate) fn header(&self) -> &Header {
        &self.header
    }

    pub(crate) fn section(&self) -> Section {
        self.section
    }

    fn count(&self, section: Section) -> u16 {
        match section {
            Section::Questions => self.header.questions,
            Section::Answers => self.header.answers,
            Section::Authorities => self.header.authorities,
            Section::Additionals => self.header.additionals,
            Section::NotStarted | Section::Done => 0,
        }
    }

    fn advance(&mut self) {
        self.index = 0;
        self.section = match self.section {
            Section::NotStarted => Section::Questions,
            Section::Questions => Section::Answers,
            Section::Answers => Section::Authorities,
            Section::Authorities => Section::Additionals,
            Section::Additionals | Section::Done => Section::Done,
        };
    }

    fn check_section(&self, section: Section) -> Result<()> {
        if self.section == Section::NotStarted {
            return Err(Error::ErrNotMdnsMessage);
        }
        if self.section != section {
            return Err(Error::ErrSectionDone);
        }
        Ok(())
    }

    pub(crate) fn question(&mut self) -> Result<Question> {
        self.check_section(Section::Questions)?;
        if self.index >= self.count(Section::Questions) as usize {
            self.advance();
            return Err(Error::ErrSectionDone);
        }
        let (q, off) = Question::unpack(self.msg, self.off)?;
        self.off = off;
        self.index += 1;
        Ok(q)
    }

    pub(crate) fn skip_all_questions(&mut self) -> Result<()> {
        self.check_section(Section::Questions)?;
        while self.index < self.count(Section::Questions) as usize {
            self.off = Question::skip(self.msg, self.off)?;
            self.index += 1;
        }
        self.advance();
        Ok(())
    }

    fn resource(&mut self, section: Section) -> Result<Record> {
        self.check_section(section)?;
        if self.index >= self.count(section) as usize {
            self.advance();
            return Err(Error::ErrSectionDone);
        }
        let (r, off) = Record::unpack(self.msg, self.off)?;
        self.off = off;
        self.index += 1;
        Ok(r)
    }

    fn skip_all_resources(&mut self, section: Section) -> Result<()> {
        self.check_section(section)?;
        while self.index < self.count(section) as usize {
            self.off = Record::skip(self.msg, self.off)?;
            self.index += 1;
        }
        self.advance();
        Ok(())
    }

    pub(crate) fn answer(&mut self) -> Result<Record> {
        self.resource(Section::Answers)
    }

    pub(crate) fn skip_all_answers(&mut self) -> Result<()> {
        self.skip_all_resources(Section::Answers)
    }

    pub(crate) fn authority(&mut self) -> Result<Record> {
        self.resource(Section::Authorities)
    }

    pub(crate) fn additional(&mut self) -> Result<Record> {
        self.resource(Section::Additionals)
    }

    /// Next record of the answer, authority or additional sections, scanned
    /// as one sequence. Questions must have been consumed first.
    pub(crate) fn any_record(&mut self) -> Result<(Section, Record)> {
        loop {
            let section = self.section;
            let result = match section {
                Section::Answers => self.answer(),
                Section::Authorities => self.authority(),
                Section::Additionals => self.additional(),
                Section::Done => return Err(Error::ErrSectionDone),
                Section::NotStarted => return Err(Error::ErrNotMdnsMessage),
                Section::Questions => {
                    self.skip_all_questions()?;
                    continue;
                }
            };
            match result {
                Ok(record) => return Ok((section, record)),
                Err(Error::ErrSectionDone) => continue,
                Err(err) => return Err(err),
            }
        }
    }
}
