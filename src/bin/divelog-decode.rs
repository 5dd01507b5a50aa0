use anyhow::{bail, Context as _, Result};
use divelog::{Context, DeviceClock, Error, FieldKind, FieldValue, Parser};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(
    about = "Decode a downloaded dive computer record: print its timestamp, header fields and sample stream. The FILE holds one raw dive blob as delivered by the download layer."
)]
struct Opt {
    #[structopt(
        short,
        long,
        help = "Parser family: cressi-leonardo, divesystem-idive, oceanic-atom2, \
                oceanic-vtpro, reefnet-sensuspro, reefnet-sensusultra, \
                shearwater-predator, shearwater-petrel, suunto-eon, suunto-spyder, \
                suunto-eonsteel, uwatec-memomouse, uwatec-smart"
    )]
    family: String,

    #[structopt(short, long, default_value = "0", help = "Model code, where the family needs one")]
    model: u32,

    #[structopt(short, long, default_value = "0", help = "Serial number, where the family needs one")]
    serial: u32,

    #[structopt(
        long,
        default_value = "0",
        help = "Device clock at download time, for families with relative timestamps"
    )]
    devtime: u32,

    #[structopt(
        long,
        default_value = "0",
        help = "Host UNIX time at download time, for families with relative timestamps"
    )]
    systime: i64,

    #[structopt(name = "FILE", parse(from_os_str))]
    file: PathBuf,
}

const FIELDS: &[(&str, FieldKind)] = &[
    ("divetime", FieldKind::DiveTime),
    ("maxdepth", FieldKind::MaxDepth),
    ("avgdepth", FieldKind::AvgDepth),
    ("mode", FieldKind::DiveMode),
    ("salinity", FieldKind::Salinity),
    ("atmospheric", FieldKind::Atmospheric),
    ("temperature min", FieldKind::TemperatureMinimum),
    ("temperature max", FieldKind::TemperatureMaximum),
    ("temperature surface", FieldKind::TemperatureSurface),
];

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let data = {
        let mut f =
            File::open(&opt.file).with_context(|| format!("Failed to open {:?}", opt.file))?;
        let mut buf: Vec<u8> = Vec::new();
        f.read_to_end(&mut buf)
            .with_context(|| format!("Failed to buffer {:?}", opt.file))?;
        buf
    };

    let ctx = Context::new();
    let clock = DeviceClock::new(opt.devtime, opt.systime);
    let mut parser = match opt.family.as_str() {
        "cressi-leonardo" => Parser::cressi_leonardo(&ctx),
        "divesystem-idive" => Parser::divesystem_idive(&ctx),
        "oceanic-atom2" => Parser::oceanic_atom2(&ctx, opt.model, opt.serial),
        "oceanic-vtpro" => Parser::oceanic_vtpro(&ctx),
        "reefnet-sensuspro" => Parser::reefnet_sensuspro(&ctx, clock),
        "reefnet-sensusultra" => Parser::reefnet_sensusultra(&ctx, clock),
        "shearwater-predator" => Parser::shearwater_predator(&ctx, opt.serial),
        "shearwater-petrel" => Parser::shearwater_petrel(&ctx, opt.serial),
        "suunto-eon" => Parser::suunto_eon(&ctx, false),
        "suunto-spyder" => Parser::suunto_eon(&ctx, true),
        "suunto-eonsteel" => Parser::suunto_eonsteel(&ctx, opt.model),
        "uwatec-memomouse" => Parser::uwatec_memomouse(&ctx, clock),
        "uwatec-smart" => Parser::uwatec_smart(&ctx, opt.model, clock)
            .context("unknown Uwatec Smart model code")?,
        family => bail!("unknown parser family {:?}", family),
    };
    parser.set_data(&data);

    match parser.datetime() {
        Ok(datetime) => println!("datetime: {}", datetime),
        Err(Error::Unsupported) => {}
        Err(e) => println!("datetime: error: {}", e),
    }

    for (name, kind) in FIELDS {
        match parser.field(*kind, 0) {
            Ok(value) => println!("{}: {:?}", name, value),
            Err(Error::Unsupported) => {}
            Err(e) => println!("{}: error: {}", name, e),
        }
    }

    if let Ok(FieldValue::Count(count)) = parser.field(FieldKind::GasmixCount, 0) {
        for i in 0..count {
            println!("gasmix {}: {:?}", i, parser.field(FieldKind::Gasmix, i)?);
        }
    }
    if let Ok(FieldValue::Count(count)) = parser.field(FieldKind::TankCount, 0) {
        for i in 0..count {
            println!("tank {}: {:?}", i, parser.field(FieldKind::Tank, i)?);
        }
    }
    let mut index = 0;
    while let Ok(value) = parser.field(FieldKind::String, index) {
        if let FieldValue::String(string) = value {
            println!("{}: {}", string.desc, string.value);
        }
        index += 1;
    }

    for sample in parser.samples()? {
        match sample {
            Ok(sample) => println!("{:?}", sample),
            Err(e) => {
                println!("Error: {}", e);
                break;
            }
        }
    }

    Ok(())
}
