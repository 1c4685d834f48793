mod county;

pub use county::CountyService;
