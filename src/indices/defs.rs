//! Line index vocabulary and band geometry
//!
//! The boundary values are a fixed constant table that must match the one
//! used when the template library was measured; the library's precomputed
//! averages are only comparable to observations measured with identical
//! bands. All boundaries are vacuum wavelengths in Angstroms.
//!
//! Indices are stored in one fixed declaration order shared by the
//! calculator, the template library and the matcher. Alignment between the
//! observed vector and the library columns is positional; there is no
//! sort-by-name step anywhere.

/// Number of named line indices
pub const LINE_INDEX_COUNT: usize = 43;

/// Band geometry for one index: either a single numerator band over a
/// denominator band, or two weighted numerator bands over a denominator.
#[derive(Debug, Clone, Copy)]
pub enum Bands {
    Single {
        num_lo: f64,
        num_hi: f64,
        den_lo: f64,
        den_hi: f64,
    },
    Dual {
        num1_lo: f64,
        num1_hi: f64,
        w1: f64,
        num2_lo: f64,
        num2_hi: f64,
        w2: f64,
        den_lo: f64,
        den_hi: f64,
    },
}

/// One named line index definition
#[derive(Debug, Clone, Copy)]
pub struct IndexDef {
    pub name: &'static str,
    pub bands: Bands,
}

const fn single(name: &'static str, num_lo: f64, num_hi: f64, den_lo: f64, den_hi: f64) -> IndexDef {
    IndexDef {
        name,
        bands: Bands::Single {
            num_lo,
            num_hi,
            den_lo,
            den_hi,
        },
    }
}

#[allow(clippy::too_many_arguments)]
const fn dual(
    name: &'static str,
    num1_lo: f64,
    num1_hi: f64,
    w1: f64,
    num2_lo: f64,
    num2_hi: f64,
    w2: f64,
    den_lo: f64,
    den_hi: f64,
) -> IndexDef {
    IndexDef {
        name,
        bands: Bands::Dual {
            num1_lo,
            num1_hi,
            w1,
            num2_lo,
            num2_hi,
            w2,
            den_lo,
            den_hi,
        },
    }
}

/// The full index vocabulary: atomic and molecular features, five broad
/// color regions, carbon-star bands, and three white-dwarf Balmer indices.
pub static LINE_INDICES: [IndexDef; LINE_INDEX_COUNT] = [
    single("CaK", 3924.8111, 3944.8163, 3944.8163, 3954.8189),
    single("Cadel", 4087.8536, 4117.8618, 4137.8670, 4177.1771),
    single("CaI4217", 4217.8880, 4237.8932, 4237.8932, 4257.1981),
    single("Gband", 4286.2057, 4316.2136, 4261.1992, 4286.2057),
    single("Hgam", 4333.7182, 4348.7222, 4356.2242, 4371.2281),
    single("FeI4383", 4379.8305, 4389.8331, 4356.2242, 4371.2281),
    single("FeI4404", 4401.0358, 4411.0384, 4416.0397, 4426.0423),
    single("Hbeta", 4848.3542, 4878.3622, 4818.3463, 4848.3542),
    single("MgI", 5154.1357, 5194.1463, 5101.4214, 5151.4348),
    single("NaD", 5881.6297, 5906.6364, 5911.6378, 5936.6445),
    single("CaI6162", 6151.7021, 6176.7088, 6121.6941, 6146.7008),
    single("Halpha", 6549.8090, 6579.8171, 6584.8184, 6614.8265),
    single("CaH2", 6815.8576, 6847.8664, 7043.9419, 7047.9430),
    single("CaH3", 6961.9198, 6991.9279, 7043.9419, 7047.9430),
    single("TiO5", 7127.9646, 7136.9670, 7043.9419, 7047.9430),
    single("VO7434", 7432.0465, 7472.0573, 7552.0789, 7572.0843),
    dual(
        "VO7445", 7352.0249, 7402.0384, 0.5625, 7512.0681, 7562.0816, 0.4375, 7422.0438, 7472.0573,
    ),
    dual(
        "VO-B", 7862.1626, 7882.1680, 0.5000, 8082.2220, 8102.2274, 0.5000, 7962.1896, 8002.2004,
    ),
    single("VO7912", 7902.1734, 7982.1950, 8102.2274, 8152.2409),
    dual(
        "Rb-B", 7924.7796, 7934.7823, 0.5000, 7964.7904, 7974.7931, 0.5000, 7944.7850, 7954.7877,
    ),
    single("NaI", 8179.2482, 8203.2547, 8153.2412, 8177.2477),
    single("TiO8", 8402.3085, 8417.3125, 8457.3233, 8472.3274),
    single("TiO8440", 8442.3193, 8472.3274, 8402.3085, 8422.3139),
    dual(
        "Cs-A", 8498.4341, 8508.4368, 0.5000, 8538.4449, 8548.4476, 0.5000, 8518.4395, 8528.4422,
    ),
    single("CaII8498", 8485.3309, 8515.3390, 8515.3390, 8545.3471),
    single("CrH-A", 8582.3571, 8602.3626, 8623.3682, 8643.3736),
    single("CaII8662", 8652.3761, 8677.3828, 8627.3693, 8652.3761),
    single("FeI8689", 8686.3853, 8696.3880, 8666.3799, 8676.3826),
    single("FeH", 9880.0, 10000.0, 9820.0, 9860.0),
    // Broad color regions against a common red band
    single("region1", 4160.0, 4210.0, 7480.0, 7580.0),
    single("region2", 4550.0, 4650.0, 7480.0, 7580.0),
    single("region3", 5700.0, 5800.0, 7480.0, 7580.0),
    single("region4", 9100.0, 9200.0, 7480.0, 7580.0),
    single("region5", 10100.0, 10200.0, 7480.0, 7580.0),
    // Carbon star bands
    single("C2-4382", 4350.0, 4380.0, 4450.0, 4600.0),
    single("C2-4737", 4650.0, 4730.0, 4750.0, 4850.0),
    single("C2-5165", 5028.0, 5165.0, 5210.0, 5380.0),
    single("C2-5636", 5400.0, 5630.0, 5650.0, 5800.0),
    single("CN-6926", 6935.0, 7035.0, 6850.0, 6900.0),
    single("CN-7872", 7850.0, 8050.0, 7650.0, 7820.0),
    // White dwarf Balmer indices
    single("WD-Halpha", 6519.0, 6609.0, 6645.0, 6700.0),
    single("WD-Hbeta", 4823.0, 4900.0, 4945.0, 4980.0),
    single("WD-Hgamma", 4290.0, 4405.0, 4430.0, 4460.0),
];

/// Position of a named index in the fixed order, if it exists.
pub fn index_position(name: &str) -> Option<usize> {
    LINE_INDICES.iter().position(|def| def.name == name)
}
