use clap::{Parser, Subcommand};
use smart3_rs::{
    init_logger, log_info, PhysicalLayer, PluInfo, Price, Smart3BaudRate, Smart3Config,
    Smart3Device, Smart3Error,
};

#[derive(Parser)]
#[command(name = "smart3-cli")]
#[command(about = "CLI tool for Smart3 fiscal cash registers")]
struct Cli {
    /// Serial port the register is wired to.
    #[arg(short, long)]
    port: String,

    #[arg(short, long, default_value = "9600")]
    baudrate: u32,

    /// Use RS-485 instead of RS-232.
    #[arg(long)]
    rs485: bool,

    /// RS-485 unit number (1..=16).
    #[arg(long, default_value = "1")]
    unit: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One hello/status exchange.
    Keepalive,
    /// Read the PLU records between two ids.
    ReadPlu { from: String, to: String },
    /// Write one PLU record.
    WritePlu {
        id: String,
        name: String,
        price: String,
        #[arg(default_value = "1")]
        department: u8,
        #[arg(default_value = "1")]
        tax: u8,
    },
    /// Read the financial report.
    FinancialReport,
    /// Perform the end-of-day fiscal closing.
    FiscalClosing,
}

#[tokio::main]
async fn main() -> Result<(), Smart3Error> {
    init_logger();

    let cli = Cli::parse();
    let config = Smart3Config {
        port_name: cli.port,
        baud_rate: Smart3BaudRate::from(cli.baudrate),
        physical_layer: if cli.rs485 {
            PhysicalLayer::Rs485
        } else {
            PhysicalLayer::Rs232
        },
        unit: cli.unit,
        ..Smart3Config::default()
    };
    let device = Smart3Device::new(config);

    match cli.command {
        Commands::Keepalive => {
            device.keepalive().await?;
            log_info("cash register responded");
        }
        Commands::ReadPlu { from, to } => {
            let records = device.read_plu_infos(&from, &to, None).await?;
            for plu in records {
                log_info(&format!(
                    "{} {:?} {} dept {} tax {}",
                    plu.id(),
                    plu.name(),
                    plu.price(),
                    plu.department(),
                    plu.tax()
                ));
            }
        }
        Commands::WritePlu {
            id,
            name,
            price,
            department,
            tax,
        } => {
            let plu = PluInfo::new(id, name, Price::parse_decimal(&price)?, department, tax, 0, 1)?;
            device.write_plu_infos(vec![plu], None).await?;
            log_info("PLU written");
        }
        Commands::FinancialReport => {
            let report = device.financial_report().await?;
            log_info(&format!(
                "tickets {} items {} payments {} drawer {}",
                report.tickets_issued,
                report.items_sold,
                report.payment_amount,
                report.drawer_amount
            ));
        }
        Commands::FiscalClosing => {
            device.fiscal_closing().await?;
            log_info("fiscal closing complete");
        }
    }

    Ok(())
}
