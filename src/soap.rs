pub mod wsse;

pub mod ns {
    pub const SOAP_ENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";
}

pub mod prefix {
    pub const SOAP: &str = "soap";
}
