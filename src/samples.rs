//! Product texts shared by the unit tests.
//!
//! Written with `\n` line endings for readability; use [`crlf`] to get the
//! `\r\n` form that arrives over the feed.

pub(crate) const TORNADO_WARNING: &str = "WFUS53 KDDC 050056
TORDDC

BULLETIN - EAS ACTIVATION REQUESTED
TORNADO WARNING
NATIONAL WEATHER SERVICE DODGE CITY KS
756 PM CDT THU JUN 4 2015

KSC101-135-050130-
/O.NEW.KDDC.TO.W.0045.150605T0056Z-150605T0130Z/

BULLETIN - EAS ACTIVATION REQUESTED
TORNADO WARNING
NATIONAL WEATHER SERVICE DODGE CITY KS
756 PM CDT THU JUN 4 2015

THE NATIONAL WEATHER SERVICE IN DODGE CITY HAS ISSUED A

* TORNADO WARNING FOR...
  NORTHEASTERN LANE COUNTY IN WEST CENTRAL KANSAS...
  NORTHWESTERN NESS COUNTY IN WEST CENTRAL KANSAS...

* UNTIL 830 PM CDT

* AT 755 PM CDT...A SEVERE THUNDERSTORM CAPABLE OF PRODUCING A TORNADO
  WAS LOCATED 10 MILES NORTHEAST OF DIGHTON...MOVING EAST AT 20 MPH.

PRECAUTIONARY/PREPAREDNESS ACTIONS...

TAKE COVER NOW. MOVE TO A BASEMENT OR AN INTERIOR ROOM ON THE LOWEST
FLOOR OF A STURDY BUILDING.

&&

LAT...LON 3870 10017 3848 10017 3847 10058 3869 10057
      3870 10017
TIME...MOT...LOC 0055Z 227DEG 17KT 3869 10033

$$

RUTHI
";

pub(crate) const FLOOD_WARNING: &str = "WGUS43 KOAX 052345
FLWOAX

BULLETIN - EAS ACTIVATION REQUESTED
FLASH FLOOD WARNING
NATIONAL WEATHER SERVICE OMAHA/VALLEY NE
645 PM CDT FRI JUN 5 2015

NEC025-055-153-060545-
/O.NEW.KOAX.FA.W.0012.150605T2345Z-150606T0545Z/
/00000.0.ER.000000T0000Z.000000T0000Z.000000T0000Z.OO/

THE NATIONAL WEATHER SERVICE IN OMAHA HAS ISSUED A

* FLOOD WARNING FOR...
  CASS COUNTY IN EAST CENTRAL NEBRASKA...
  DOUGLAS COUNTY IN EAST CENTRAL NEBRASKA...
  SARPY COUNTY IN EAST CENTRAL NEBRASKA...

* UNTIL 1245 AM CDT SATURDAY

* AT 640 PM CDT...LOCAL LAW ENFORCEMENT REPORTED FLOODING OF LOW LYING
  AREAS AND CREEKS AFTER HEAVY RAIN.

LAT...LON 4135 9630 4135 9580 4090 9580 4090 9630

$$
";

/// Severe weather statement covering two separate areas, each with its own
/// UGC line and `$$` terminator.
pub(crate) const WEATHER_STATEMENT: &str = "WWUS53 KMKX 212252
SVSMKX

SEVERE WEATHER STATEMENT
NATIONAL WEATHER SERVICE MILWAUKEE/SULLIVAN WI
552 PM CDT SUN JUN 21 2015

WIC027-047-212300-
/O.CAN.KMKX.SV.W.0101.000000T0000Z-150621T2300Z/

THE SEVERE THUNDERSTORM WARNING FOR DODGE AND GREEN LAKE COUNTIES
HAS BEEN CANCELLED.

LAT...LON 4367 8900 4388 8906 4398 8876 4367 8865

$$

WIZ001-002-006>008-212330-
/O.CON.KMKX.SV.W.0102.000000T0000Z-150621T2330Z/

AT 550 PM CDT...A SEVERE THUNDERSTORM WAS LOCATED NEAR PORTAGE.

LAT...LON 4350 8950 4370 8950 4370 8920 4350 8920
TIME...MOT...LOC 2250Z 250DEG 30KT 4360 8940 4355 8960

$$
";

pub(crate) fn crlf(text: &str) -> String {
    text.replace('\n', "\r\n")
}
