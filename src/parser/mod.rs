//! Parsers that turn one dive blob into header fields and a sample
//! stream.
//!
//! A [`Parser`] is constructed for a concrete family with the parameters
//! that family needs (model code, serial, device/host clock pair,
//! calibration). It borrows the dive bytes installed with
//! [`Parser::set_data`] and decodes them on demand:
//!
//! - [`Parser::datetime`]: the timestamp embedded in the record;
//! - [`Parser::field`]: one typed header field;
//! - [`Parser::samples`]: the time-series stream, as an iterator.
//!
//! Fields that can only be derived by walking the samples are computed
//! once and memoized; installing new data drops the memo.

use std::collections::VecDeque;

use chrono::NaiveDateTime;

use crate::clock::DeviceClock;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::sample::Sample;

pub(crate) use crate::types::{FieldKind, FieldValue};

pub mod cressi_leonardo;
pub mod divesystem_idive;
pub mod oceanic_atom2;
pub mod oceanic_vtpro;
pub mod reefnet_sensus;
pub mod shearwater_predator;
pub mod suunto_eon;
pub mod suunto_eonsteel;
pub mod uwatec_memomouse;
pub mod uwatec_smart;

pub(crate) const FEET: f64 = 0.3048;
pub(crate) const PSI: f64 = 6894.75729317831;
pub(crate) const BAR: f64 = 100000.0;
pub(crate) const ATM: f64 = 101325.0;
pub(crate) const GRAVITY: f64 = 9.80665;
/// One foot of sea water, in pascal.
pub(crate) const FSW: f64 = ATM / 33.0;

pub(crate) fn fahrenheit_to_celsius(value: f64) -> f64 {
    (value - 32.0) * (5.0 / 9.0)
}

pub(crate) fn psi_to_bar(value: f64) -> f64 {
    value * PSI / BAR
}

/// One decoding pass over a dive record. Implementations decode a little
/// more input per call, pushing any completed samples onto `queue`;
/// `Ok(false)` signals the end of the record.
pub(crate) trait DecodeStep {
    fn step(&mut self, queue: &mut VecDeque<Sample>) -> Result<bool>;
}

enum IterState {
    Running,
    Done,
    Failed,
}

/// Drives a [`DecodeStep`] decoder and hands its queue out one sample at
/// a time.
pub(crate) struct StepIter<D> {
    decoder: D,
    queue: VecDeque<Sample>,
    state: IterState,
}

impl<D: DecodeStep> StepIter<D> {
    pub(crate) fn new(decoder: D) -> Self {
        StepIter {
            decoder,
            queue: VecDeque::new(),
            state: IterState::Running,
        }
    }

    fn next_sample(&mut self) -> Option<Result<Sample>> {
        loop {
            if let Some(sample) = self.queue.pop_front() {
                return Some(Ok(sample));
            }
            match self.state {
                IterState::Running => {}
                IterState::Done | IterState::Failed => return None,
            }
            match self.decoder.step(&mut self.queue) {
                Ok(true) => {}
                Ok(false) => self.state = IterState::Done,
                Err(err) => {
                    self.state = IterState::Failed;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Divetime/maxdepth accumulator used to fill the lazy field caches
/// without materializing the stream.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SampleStatistics {
    pub divetime: u32,
    pub maxdepth: f64,
}

impl SampleStatistics {
    pub(crate) fn update(&mut self, sample: &Sample) {
        match *sample {
            Sample::Time(time) => self.divetime = time,
            Sample::Depth(depth) if depth > self.maxdepth => self.maxdepth = depth,
            _ => {}
        }
    }
}

/// The sample stream of one dive. Yields samples in non-decreasing
/// [`Sample::Time`] order; a malformed record yields one `Err` and then
/// ends.
pub struct Samples<'a> {
    inner: SamplesInner<'a>,
}

enum SamplesInner<'a> {
    CressiLeonardo(StepIter<cressi_leonardo::Decoder<'a>>),
    DivesystemIdive(StepIter<divesystem_idive::Decoder<'a>>),
    OceanicAtom2(StepIter<oceanic_atom2::Decoder<'a>>),
    OceanicVtpro(StepIter<oceanic_vtpro::Decoder<'a>>),
    ReefnetSensusPro(StepIter<reefnet_sensus::ProDecoder<'a>>),
    ReefnetSensusUltra(StepIter<reefnet_sensus::UltraDecoder<'a>>),
    Shearwater(StepIter<shearwater_predator::Decoder<'a>>),
    SuuntoEon(StepIter<suunto_eon::Decoder<'a>>),
    SuuntoEonsteel(StepIter<suunto_eonsteel::Decoder<'a>>),
    UwatecMemomouse(StepIter<uwatec_memomouse::Decoder<'a>>),
    UwatecSmart(StepIter<uwatec_smart::Decoder<'a>>),
}

impl<'a> Iterator for Samples<'a> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            SamplesInner::CressiLeonardo(it) => it.next_sample(),
            SamplesInner::DivesystemIdive(it) => it.next_sample(),
            SamplesInner::OceanicAtom2(it) => it.next_sample(),
            SamplesInner::OceanicVtpro(it) => it.next_sample(),
            SamplesInner::ReefnetSensusPro(it) => it.next_sample(),
            SamplesInner::ReefnetSensusUltra(it) => it.next_sample(),
            SamplesInner::Shearwater(it) => it.next_sample(),
            SamplesInner::SuuntoEon(it) => it.next_sample(),
            SamplesInner::SuuntoEonsteel(it) => it.next_sample(),
            SamplesInner::UwatecMemomouse(it) => it.next_sample(),
            SamplesInner::UwatecSmart(it) => it.next_sample(),
        }
    }
}

enum Family {
    CressiLeonardo(cressi_leonardo::Leonardo),
    DivesystemIdive(divesystem_idive::Idive),
    OceanicAtom2(oceanic_atom2::Atom2),
    OceanicVtpro(oceanic_vtpro::Vtpro),
    ReefnetSensusPro(reefnet_sensus::SensusPro),
    ReefnetSensusUltra(reefnet_sensus::SensusUltra),
    Shearwater(shearwater_predator::Predator),
    SuuntoEon(suunto_eon::Eon),
    SuuntoEonsteel(suunto_eonsteel::Eonsteel),
    UwatecMemomouse(uwatec_memomouse::Memomouse),
    UwatecSmart(uwatec_smart::Smart),
}

/// A parser bound to one vendor family, borrowing the bytes of one dive.
pub struct Parser<'a> {
    context: Context,
    data: &'a [u8],
    family: Family,
}

impl<'a> Parser<'a> {
    fn new(context: &Context, family: Family) -> Parser<'a> {
        Parser {
            context: context.clone(),
            data: &[],
            family,
        }
    }

    pub fn cressi_leonardo(context: &Context) -> Parser<'a> {
        Parser::new(
            context,
            Family::CressiLeonardo(cressi_leonardo::Leonardo::new()),
        )
    }

    pub fn divesystem_idive(context: &Context) -> Parser<'a> {
        Parser::new(
            context,
            Family::DivesystemIdive(divesystem_idive::Idive::new()),
        )
    }

    pub fn oceanic_atom2(context: &Context, model: u32, serial: u32) -> Parser<'a> {
        Parser::new(
            context,
            Family::OceanicAtom2(oceanic_atom2::Atom2::new(model, serial)),
        )
    }

    pub fn oceanic_vtpro(context: &Context) -> Parser<'a> {
        Parser::new(context, Family::OceanicVtpro(oceanic_vtpro::Vtpro::new()))
    }

    pub fn reefnet_sensuspro(context: &Context, clock: DeviceClock) -> Parser<'a> {
        Parser::new(
            context,
            Family::ReefnetSensusPro(reefnet_sensus::SensusPro::new(clock)),
        )
    }

    pub fn reefnet_sensusultra(context: &Context, clock: DeviceClock) -> Parser<'a> {
        Parser::new(
            context,
            Family::ReefnetSensusUltra(reefnet_sensus::SensusUltra::new(clock)),
        )
    }

    pub fn shearwater_predator(context: &Context, serial: u32) -> Parser<'a> {
        Parser::new(
            context,
            Family::Shearwater(shearwater_predator::Predator::new(serial, false)),
        )
    }

    pub fn shearwater_petrel(context: &Context, serial: u32) -> Parser<'a> {
        Parser::new(
            context,
            Family::Shearwater(shearwater_predator::Predator::new(serial, true)),
        )
    }

    pub fn suunto_eon(context: &Context, spyder: bool) -> Parser<'a> {
        Parser::new(context, Family::SuuntoEon(suunto_eon::Eon::new(spyder)))
    }

    pub fn suunto_eonsteel(context: &Context, model: u32) -> Parser<'a> {
        Parser::new(
            context,
            Family::SuuntoEonsteel(suunto_eonsteel::Eonsteel::new(model)),
        )
    }

    pub fn uwatec_memomouse(context: &Context, clock: DeviceClock) -> Parser<'a> {
        Parser::new(
            context,
            Family::UwatecMemomouse(uwatec_memomouse::Memomouse::new(clock)),
        )
    }

    /// Fails with [`Error::InvalidArgs`] for model codes outside the
    /// Smart/Galileo family.
    pub fn uwatec_smart(context: &Context, model: u32, clock: DeviceClock) -> Result<Parser<'a>> {
        Ok(Parser::new(
            context,
            Family::UwatecSmart(uwatec_smart::Smart::new(model, clock)?),
        ))
    }

    /// The context this parser was created with.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The currently installed dive bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Install the bytes of one dive. Drops any memoized fields; the
    /// bytes must stay alive until they are replaced or the parser is
    /// dropped.
    pub fn set_data(&mut self, data: &'a [u8]) {
        self.data = data;
        match &mut self.family {
            Family::CressiLeonardo(f) => f.invalidate(),
            Family::DivesystemIdive(f) => f.invalidate(),
            Family::OceanicAtom2(f) => f.invalidate(),
            Family::OceanicVtpro(f) => f.invalidate(),
            Family::ReefnetSensusPro(f) => f.invalidate(),
            Family::ReefnetSensusUltra(f) => f.invalidate(),
            Family::Shearwater(f) => f.invalidate(),
            Family::SuuntoEon(f) => f.invalidate(),
            Family::SuuntoEonsteel(f) => f.install(data),
            Family::UwatecMemomouse(f) => f.invalidate(),
            Family::UwatecSmart(f) => f.invalidate(),
        }
    }

    /// Decode the timestamp embedded in the record.
    pub fn datetime(&self) -> Result<NaiveDateTime> {
        let data = self.data;
        match &self.family {
            Family::CressiLeonardo(f) => f.datetime(data),
            Family::DivesystemIdive(f) => f.datetime(data),
            Family::OceanicAtom2(f) => f.datetime(data),
            Family::OceanicVtpro(f) => f.datetime(data),
            Family::ReefnetSensusPro(f) => f.datetime(data),
            Family::ReefnetSensusUltra(f) => f.datetime(data),
            Family::Shearwater(f) => f.datetime(data),
            Family::SuuntoEon(f) => f.datetime(data),
            Family::SuuntoEonsteel(f) => f.datetime(data),
            Family::UwatecMemomouse(f) => f.datetime(data),
            Family::UwatecSmart(f) => f.datetime(data),
        }
    }

    /// Decode one header field. `index` selects among multi-valued fields
    /// (gas mixes, tanks, strings) and is ignored elsewhere.
    ///
    /// The first call that needs sample-derived values walks the sample
    /// stream once and memoizes the result.
    pub fn field(&mut self, kind: FieldKind, index: u32) -> Result<FieldValue> {
        let data = self.data;
        match &mut self.family {
            Family::CressiLeonardo(f) => f.field(data, kind, index),
            Family::DivesystemIdive(f) => f.field(data, kind, index),
            Family::OceanicAtom2(f) => f.field(data, kind, index),
            Family::OceanicVtpro(f) => f.field(data, kind, index),
            Family::ReefnetSensusPro(f) => f.field(data, kind, index),
            Family::ReefnetSensusUltra(f) => f.field(data, kind, index),
            Family::Shearwater(f) => f.field(data, kind, index),
            Family::SuuntoEon(f) => f.field(data, kind, index),
            Family::SuuntoEonsteel(f) => f.field(data, kind, index),
            Family::UwatecMemomouse(f) => f.field(data, kind, index),
            Family::UwatecSmart(f) => f.field(data, kind, index),
        }
    }

    /// The sample stream of the installed dive. Two successive calls
    /// yield identical streams.
    pub fn samples(&mut self) -> Result<Samples<'a>> {
        let data = self.data;
        let inner = match &mut self.family {
            Family::CressiLeonardo(f) => {
                SamplesInner::CressiLeonardo(StepIter::new(f.decoder(data)?))
            }
            Family::DivesystemIdive(f) => {
                SamplesInner::DivesystemIdive(StepIter::new(f.decoder(data)?))
            }
            Family::OceanicAtom2(f) => SamplesInner::OceanicAtom2(StepIter::new(f.decoder(data)?)),
            Family::OceanicVtpro(f) => SamplesInner::OceanicVtpro(StepIter::new(f.decoder(data)?)),
            Family::ReefnetSensusPro(f) => {
                SamplesInner::ReefnetSensusPro(StepIter::new(f.decoder(data)?))
            }
            Family::ReefnetSensusUltra(f) => {
                SamplesInner::ReefnetSensusUltra(StepIter::new(f.decoder(data)?))
            }
            Family::Shearwater(f) => SamplesInner::Shearwater(StepIter::new(f.decoder(data)?)),
            Family::SuuntoEon(f) => SamplesInner::SuuntoEon(StepIter::new(f.decoder(data)?)),
            Family::SuuntoEonsteel(f) => {
                SamplesInner::SuuntoEonsteel(StepIter::new(f.decoder(data)?))
            }
            Family::UwatecMemomouse(f) => {
                SamplesInner::UwatecMemomouse(StepIter::new(f.decoder(data)?))
            }
            Family::UwatecSmart(f) => SamplesInner::UwatecSmart(StepIter::new(f.decoder(data)?)),
        };
        Ok(Samples { inner })
    }

    /// Install the depth calibration of the Reefnet families: surface
    /// pressure in Pa and hydrostatic pressure per meter of depth in
    /// Pa/m. Any other family fails with [`Error::InvalidArgs`].
    pub fn set_calibration(&mut self, atmospheric: f64, hydrostatic: f64) -> Result<()> {
        match &mut self.family {
            Family::ReefnetSensusPro(f) => {
                f.set_calibration(atmospheric, hydrostatic);
                Ok(())
            }
            Family::ReefnetSensusUltra(f) => {
                f.set_calibration(atmospheric, hydrostatic);
                Ok(())
            }
            _ => Err(Error::InvalidArgs),
        }
    }
}
